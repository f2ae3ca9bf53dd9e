use crate::error::WileedotError;

use super::Config;

pub trait Format<'a> {
    /// Parse the provided document and return a validated config
    fn parse(&self) -> Result<Config, WileedotError>;
}
