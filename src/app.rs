use std::sync::Arc;

use dekho_live_view_lib::{PollerEvent, PollerHandle};
use gtk4::{
    Application, ApplicationWindow, Box, EventControllerKey, Label, Picture,
    gio::prelude::{ApplicationExt, ApplicationExtManual},
    glib::{ExitCode, clone},
    prelude::{BoxExt, EventControllerExt, GtkWindowExt, WidgetExt},
};
use tokio::sync::broadcast::error::RecvError;

use crate::{config::Config, image::ImageExt};

const APP_ID: &str = "in.dekho.LiveView";

pub struct App {
    gtk_app: Application,
}

impl App {
    pub fn build(interactive_debug: bool, config: Config, poller: Arc<PollerHandle>) -> Self {
        let gtk_app = Application::builder().application_id(APP_ID).build();

        let app = Self { gtk_app };

        if interactive_debug {
            if let Err(err) = gtk4::glib::setenv("GTK_DEBUG", "interactive", true) {
                log::error!("unable to open gtk interactive debugger: {err}")
            } else {
                log::info!("opened interactive debugger")
            }
        }

        app.gtk_app.connect_activate(move |app| {
            build_ui(app, &config, poller.clone());
        });

        app
    }

    pub fn run(&self) -> ExitCode {
        let empty_args: Vec<String> = vec![];
        self.gtk_app.run_with_args(&empty_args)
    }
}

fn build_ui(app: &Application, config: &Config, poller: Arc<PollerHandle>) {
    let window = build_window(app, config, poller.clone());
    let container = Box::builder().orientation(gtk4::Orientation::Vertical).spacing(6).build();

    let picture = Picture::builder()
        .vexpand(true)
        .hexpand(true)
        .height_request(config.image.widget_size)
        .content_fit(gtk4::ContentFit::Contain)
        .build();
    let status = Label::builder().label(format!("waiting for {}", poller.config().endpoint)).xalign(0.0).build();

    container.append(&picture);
    container.append(&status);
    window.set_child(Some(&container));

    let resize_size = config.image.resize_size;
    let mut events = poller.subscribe();
    glib::spawn_future_local(clone!(
        #[strong]
        picture,
        #[strong]
        status,
        async move {
            loop {
                match events.recv().await {
                    Ok(PollerEvent::FrameUpdated { .. }) | Err(RecvError::Lagged(_)) => {
                        let Some(frame) = poller.current_frame() else { continue };
                        let pixbuf = match frame.to_pixbuf(resize_size) {
                            Ok(pixbuf) => pixbuf,
                            Err(err) => {
                                log::error!("unable to create pixbuf for frame {}: {err}", frame.sequence());
                                continue;
                            }
                        };
                        picture.set_pixbuf(Some(&pixbuf));
                        status.set_label(&format!("frame {} ({}x{})", frame.sequence(), frame.width(), frame.height()));
                    }
                    Ok(PollerEvent::FetchFailed { kind, consecutive_failures, .. }) => {
                        status.set_label(&format!("{kind} error, {consecutive_failures} failed requests in a row"));
                    }
                    Ok(PollerEvent::Degraded { consecutive_failures }) => {
                        status.set_label(&format!(
                            "camera unavailable after {consecutive_failures} failed requests, showing last frame"
                        ));
                        return;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    ));

    window.present();
}

fn build_window(app: &Application, config: &Config, poller: Arc<PollerHandle>) -> ApplicationWindow {
    let window = ApplicationWindow::builder()
        .application(app)
        .title("DEKHO live view")
        .default_width(config.window.width)
        .default_height(config.window.height)
        .build();

    let event_controller = EventControllerKey::new();
    event_controller.connect_key_pressed(clone!(
        #[weak]
        window,
        #[upgrade_or]
        gtk4::glib::Propagation::Proceed,
        move |_, key, _, _| {
            if key == gtk4::gdk::Key::Escape {
                window.close();
            }
            gtk4::glib::Propagation::Proceed
        }
    ));
    window.add_controller(event_controller);

    window.connect_close_request(move |_| {
        poller.stop();
        gtk4::glib::Propagation::Proceed
    });

    window
}
