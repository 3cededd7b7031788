use dekho_live_view_lib::DisplayResource;
use gtk4::gdk_pixbuf::Pixbuf;

pub trait ImageExt {
    /// turn the frame into a gdk pixbuf which can directly be displayed inside a gtk picture
    ///
    /// the bigger side of the frame is scaled down to `size` if it is longer
    fn to_pixbuf(&self, size: u32) -> Result<Pixbuf, Box<dyn std::error::Error>>;
}

impl ImageExt for DisplayResource {
    fn to_pixbuf(&self, size: u32) -> Result<Pixbuf, Box<dyn std::error::Error>> {
        let rgb_image = self.decode_to_fit(size)?.to_rgb8();

        let height = i32::try_from(rgb_image.height())?;
        let width = i32::try_from(rgb_image.width())?;

        let bytes = gtk4::glib::Bytes::from(&rgb_image.into_raw());
        let pixbuf = Pixbuf::from_bytes(&bytes, gtk4::gdk_pixbuf::Colorspace::Rgb, false, 8, width, height, width * 3);
        Ok(pixbuf)
    }
}
