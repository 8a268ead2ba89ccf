pub mod view;

pub mod util;
