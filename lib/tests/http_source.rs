use std::{io::Cursor, time::Duration};

use bytes::Bytes;
use dekho_live_view_lib::{
    Error, ErrorKind, FrameRequest, FrameSource, HttpFrameSource, PollerConfig, PollerEvent, start,
};
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::{StatusCode, Url};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

fn png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(3, 3, Rgb([30, 60, 90])).write_to(&mut out, ImageFormat::Png).expect("png should encode");
    out.into_inner()
}

/// answer every incoming connection with the same canned http response
async fn serve(status_line: &'static str, body: Vec<u8>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = vec![0_u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Url::parse(&format!("http://{addr}/video_feed")).unwrap()
}

#[tokio::test]
async fn fetches_image_bytes() {
    let body = png();
    let url = serve("200 OK", body.clone()).await;
    let source = HttpFrameSource::new(Some(Duration::from_secs(5))).unwrap();

    let bytes = source.fetch(&FrameRequest::new(url, 1)).await.unwrap();
    assert_eq!(bytes, Bytes::from(body));
}

#[tokio::test]
async fn non_success_status_is_a_server_error() {
    let url = serve("503 Service Unavailable", b"camera offline".to_vec()).await;
    let source = HttpFrameSource::new(Some(Duration::from_secs(5))).unwrap();

    let err = source.fetch(&FrameRequest::new(url, 1)).await.unwrap_err();
    assert!(matches!(err, Error::Server(StatusCode::SERVICE_UNAVAILABLE)));
    assert_eq!(err.kind(), Some(ErrorKind::Server));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = Url::parse(&format!("http://{addr}/video_feed")).unwrap();
    let source = HttpFrameSource::new(Some(Duration::from_secs(5))).unwrap();

    let err = source.fetch(&FrameRequest::new(url, 1)).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Transport));
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    let url = Url::parse(&format!("http://{addr}/video_feed")).unwrap();
    let source = HttpFrameSource::new(Some(Duration::from_millis(200))).unwrap();

    let err = source.fetch(&FrameRequest::new(url, 1)).await.unwrap_err();
    assert!(matches!(err, Error::Transport(ref inner) if inner.is_timeout()));
}

#[tokio::test]
async fn http_poller_publishes_frames() {
    let url = serve("200 OK", png()).await;
    let config = PollerConfig::new(url.as_str()).unwrap().with_interval(Duration::from_millis(50));
    let poller = start(config).unwrap();
    let mut events = poller.subscribe();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    assert!(matches!(event, PollerEvent::FrameUpdated { sequence: 1, .. }));

    let frame = poller.current_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (3, 3));
    poller.stop();
    assert!(frame.is_released());
}
