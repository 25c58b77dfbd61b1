pub mod frame;
pub mod level;
pub mod pipe;
pub mod ring_buffer;
