/// Lowercase and replace `-` and spaces with `_`, e.g. `"Global Trade"` → `global_trade`.
pub fn snake_ident(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_ident_normalizes_names() {
        assert_eq!(snake_ident("Economy"), "economy");
        assert_eq!(snake_ident("Global Trade"), "global_trade");
        assert_eq!(snake_ident("export-price-index"), "export_price_index");
    }
}
