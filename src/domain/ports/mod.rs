mod dispatcher_port;
mod file_system_port;
mod image_view_port;
mod transport_port;

pub use dispatcher_port::{UiDispatcher, UiJob};
pub use file_system_port::FileSystemPort;
pub use image_view_port::{ImagePlatform, ImageView};
#[cfg(test)]
pub use transport_port::MockHttpTransport;
pub use transport_port::{HttpTransport, TransportRequest, TransportResponse};
