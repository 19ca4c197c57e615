pub mod glide;
pub mod voodoo;
