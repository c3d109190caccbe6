pub mod bank;
pub mod chronopost;
pub mod greeting;
pub mod quiz;
pub mod registration;
pub mod training;
pub mod user;

pub use bank::*;
pub use chronopost::*;
pub use greeting::*;
pub use quiz::*;
pub use registration::*;
pub use training::*;
pub use user::*;
