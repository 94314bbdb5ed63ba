//! Overpass QL query builders.

use wayfare_core::CountryArea;

use crate::providers::CountryFilter;

/// Place kinds a candidate search matches.
pub const PLACE_KINDS: &str = "city|town|village";

const HEADER: &str = "[out:json][timeout:25];";

/// Escape `value` for use inside a double-quoted QL string literal.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Every node, way and relation named `name` whose place tag is a
/// city, town or village, with centers and tags.
pub fn places_named(name: &str, area: Option<&CountryArea>) -> String {
    let name = escape_literal(name);
    let (scope_decl, scope_filter) = match area {
        Some(area) => (format!("area(id:{})->.scope;\n", area.area_id), "(area.scope)"),
        None => (String::new(), ""),
    };

    let mut query = format!("{}\n{}(\n", HEADER, scope_decl);
    for element in ["node", "way", "relation"] {
        query.push_str(&format!(
            "  {}[\"name\"=\"{}\"][\"place\"~\"{}\"]{};\n",
            element, name, PLACE_KINDS, scope_filter
        ));
    }
    query.push_str(");\nout center tags;\n");
    query
}

/// Country-level administrative boundary relations, ids only.
pub fn country_relations(filter: &CountryFilter) -> String {
    let (tag, value) = match filter {
        CountryFilter::IsoCode(code) => ("ISO3166-1", code.trim().to_ascii_uppercase()),
        CountryFilter::Name(name) => ("name", name.clone()),
    };
    format!(
        "{}\nrelation[\"admin_level\"=\"2\"][\"boundary\"=\"administrative\"][\"{}\"=\"{}\"];\nout ids;\n",
        HEADER,
        tag,
        escape_literal(&value)
    )
}

/// Administrative boundary relations whose English name is `name`, with
/// their member ways and the ways' geometry.
pub fn admin_boundary(name: &str) -> String {
    format!(
        "{}\nrelation[\"name:en\"=\"{}\"][\"boundary\"=\"administrative\"];\nout body;\n>;\nout geom;\n",
        HEADER,
        escape_literal(name.trim())
    )
}
