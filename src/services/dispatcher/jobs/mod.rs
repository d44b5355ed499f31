mod dispatch;

pub use dispatch::DispatchJob;
