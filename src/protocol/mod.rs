/// Wire protocol: packet framing, the buffered byte reader that backs
/// it, and the framed transport built on top of both.
mod packet;
mod reader;
mod transport;

pub use packet::{checksum, HEADER_HI, HEADER_LO, Packet, PacketKind};
pub use reader::ByteReader;
pub use transport::FramedTransport;
