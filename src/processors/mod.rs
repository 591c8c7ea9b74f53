//! Document processors

pub mod html;
