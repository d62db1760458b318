pub mod decode;
pub mod encode;
pub mod frame;
pub mod layout;
