use derive_builder::Builder;

type ValidatorResult<T> = std::result::Result<T, String>;

/// Parameters handed to the animation encoder for every frame.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ConversionOptions {
    /// Compression factor, `0..=100`
    #[builder(default = "1")]
    pub quality: u8,
    /// Trade off between encoding speed and size/quality, `0..=6`
    #[builder(default = "6")]
    pub compression_level: u8,
    /// `0` loops forever
    #[builder(default = "0")]
    pub loop_count: u32,
}

impl ConversionOptions {
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder::default()
    }
}

impl ConversionOptionsBuilder {
    fn validate(&self) -> ValidatorResult<()> {
        if matches!(self.quality, Some(q) if q > 100) {
            return Err("quality has to be within 0..=100".into());
        }
        if matches!(self.compression_level, Some(m) if m > 6) {
            return Err("compression level has to be within 0..=6".into());
        }
        Ok(())
    }
}

/// Parser for numeric command line values within `min..=max`.
pub fn parse_in_range<T>(min: T, max: T) -> impl Fn(&str) -> ValidatorResult<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    move |input: &str| -> ValidatorResult<T> {
        let val = input
            .parse::<T>()
            .map_err(|_| format!("invalid syntax `{input}`"))?;
        if val < min || val > max {
            Err(format!("value out of range ({min}..={max})"))
        } else {
            Ok(val)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sticker_encoding() {
        let opt = ConversionOptions::builder().build().unwrap();
        assert_eq!(opt.quality, 1);
        assert_eq!(opt.compression_level, 6);
        assert_eq!(opt.loop_count, 0);
    }

    #[test]
    fn rejects_out_of_range_method() {
        assert!(ConversionOptions::builder()
            .compression_level(7)
            .build()
            .is_err());
        assert!(ConversionOptions::builder().quality(101).build().is_err());
    }

    #[test]
    fn range_parser() {
        let parse = parse_in_range(1usize, 16);
        assert_eq!(parse("1"), Ok(1));
        assert_eq!(parse("16"), Ok(16));
        assert!(parse("0").is_err());
        assert!(parse("17").is_err());
        assert!(parse("four").is_err());
    }
}
