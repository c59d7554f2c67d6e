pub mod builders;
pub mod fake_session;

pub use builders::{NodeBuilder, TokenBuilder};
pub use fake_session::{FakeSessionFactory, ScriptedReply, SessionScript};
