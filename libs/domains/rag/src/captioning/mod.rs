mod blip;
mod captioner;

pub use blip::{BlipCaptioner, BlipConfig};
pub use captioner::Captioner;

#[cfg(test)]
pub use captioner::MockCaptioner;
