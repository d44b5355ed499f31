mod listen;

pub use listen::ListenerJob;
