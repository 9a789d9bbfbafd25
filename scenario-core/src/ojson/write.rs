use super::OrderedJson;

const INDENT: &str = "    ";

/// Serialize with 4-space indentation, one entry per line.
///
/// The output is stable: parsing it and serializing again yields the same
/// text.
pub fn to_json_string(value: &OrderedJson) -> String {
    let mut out = String::new();
    write_value(value, 0, &mut out);
    out
}

fn write_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_value(value: &OrderedJson, depth: usize, out: &mut String) {
    match value {
        OrderedJson::String(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        OrderedJson::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        OrderedJson::List(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                write_indent(depth + 1, out);
                write_value(item, depth + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            write_indent(depth, out);
            out.push(']');
        }
        OrderedJson::Map(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            let len = map.len();
            for (i, (key, item)) in map.iter().enumerate() {
                write_indent(depth + 1, out);
                out.push('"');
                out.push_str(key);
                out.push_str("\": ");
                write_value(item, depth + 1, out);
                if i + 1 < len {
                    out.push(',');
                }
                out.push('\n');
            }
            write_indent(depth, out);
            out.push('}');
        }
    }
}
