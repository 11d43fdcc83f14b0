use url::Url;

/// Currency string with thousands separators, e.g. `$1,234,567.89`.
/// Fractional digits are kept exactly as the float prints them.
pub fn format_usd(value: f64) -> String {
    let s = format!("{value}");
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (s, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", int_part.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("${sign}{grouped}.{f}"),
        None => format!("${sign}{grouped}"),
    }
}

/// Markdown link labeled with the first hostname segment, e.g.
/// `[etherscan](https://etherscan.io/token/0x...)`. None for unparseable
/// or host-less URLs.
pub fn markdown_explorer_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?;
    let label = host.split('.').next()?;
    if label.is_empty() {
        return None;
    }
    Some(format!("[{label}]({link})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_usd(68123.45), "$68,123.45");
        assert_eq!(format_usd(1_234_567.0), "$1,234,567");
        assert_eq!(format_usd(999.0), "$999");
        assert_eq!(format_usd(0.0), "$0");
    }

    #[test]
    fn keeps_small_fractions() {
        assert_eq!(format_usd(0.00003412), "$0.00003412");
    }

    #[test]
    fn formats_negative_values() {
        assert_eq!(format_usd(-1234.5), "$-1,234.5");
    }

    #[test]
    fn labels_link_with_first_host_segment() {
        assert_eq!(
            markdown_explorer_link("https://etherscan.io/token/0xabc").as_deref(),
            Some("[etherscan](https://etherscan.io/token/0xabc)")
        );
        assert_eq!(
            markdown_explorer_link("https://explorer.solana.com/address/xyz").as_deref(),
            Some("[explorer](https://explorer.solana.com/address/xyz)")
        );
    }

    #[test]
    fn rejects_unparseable_links() {
        assert_eq!(markdown_explorer_link("not a url"), None);
        assert_eq!(markdown_explorer_link(""), None);
    }
}
