pub mod listener;
pub mod mailbox;

pub use listener::UdpListener;
pub use mailbox::Mailbox;
