pub mod datetime;
pub mod feedback;
pub mod html;
pub mod logging;
pub mod media;
pub mod validation;
