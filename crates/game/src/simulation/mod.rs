mod command;
mod tick;

pub use command::InputBuffer;
pub use tick::FixedTimestep;
