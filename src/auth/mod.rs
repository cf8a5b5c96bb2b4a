pub mod session;

pub use session::{ConfigSessionProvider, Session, SessionProvider, StaticSessionProvider};
