pub mod approval;
pub mod dispatcher;
pub mod input;
pub mod xdotool;
