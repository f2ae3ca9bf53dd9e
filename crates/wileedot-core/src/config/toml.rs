use crate::error::WileedotError;

use super::{Config, Format};

#[derive(Default)]
pub struct Toml<'a> {
    input: &'a str,
}

impl<'a> Toml<'a> {
    pub fn new(input: &'a str) -> Self {
        Toml { input }
    }
}

impl<'a> From<&'a str> for Toml<'a> {
    fn from(input: &'a str) -> Self {
        Toml::new(input)
    }
}

impl<'a> Format<'a> for Toml<'a> {
    fn parse(&self) -> Result<Config, WileedotError> {
        let config: Config = toml::from_str(self.input).map_err(|e| WileedotError::ParseError {
            field: e
                .span()
                .map(|span| field_at(self.input, span.start))
                .unwrap_or_else(|| "root".to_string()),
            message: e.message().to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Best-effort name of the key on the line containing `offset`
fn field_at(input: &str, offset: usize) -> String {
    let line_start = input[..offset.min(input.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    input[line_start..]
        .split(['=', '\n'])
        .next()
        .map(str::trim)
        .filter(|key| !key.is_empty() && !key.starts_with('['))
        .unwrap_or("root")
        .to_string()
}
