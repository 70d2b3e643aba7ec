//! Protocol checkers.
//!
//! Each checker is independent of the others and holds no state between
//! calls.

pub mod dns;
pub mod fivem;
pub mod http;
pub mod minecraft;
pub mod ping;
pub mod source;
pub mod ssl;
pub mod tcp;
pub mod teamspeak;
pub mod udp;

pub use dns::DnsChecker;
pub use fivem::FiveMChecker;
pub use http::HttpChecker;
pub use minecraft::MinecraftChecker;
pub use ping::PingChecker;
pub use source::SourceChecker;
pub use ssl::SslChecker;
pub use tcp::TcpChecker;
pub use teamspeak::TeamSpeakChecker;
pub use udp::UdpChecker;
