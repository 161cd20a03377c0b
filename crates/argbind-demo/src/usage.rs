//! Plain-text usage rendered from the exported argument schema.

use argbind::schema::{ArgSchema, ShapeSchema, StyleSchema};

fn prefixes(style: StyleSchema) -> (&'static str, &'static str) {
    match style {
        StyleSchema::Dash => ("-", "--"),
        StyleSchema::SlashColon => ("/", "/"),
    }
}

fn format_arg_left(arg: &ArgSchema, style: StyleSchema) -> String {
    if arg.position.is_some() {
        return if arg.required {
            format!("<{}>", arg.name)
        } else {
            format!("[{}]", arg.name)
        };
    }

    let (short, long) = prefixes(style);
    let mut names: Vec<String> = arg.aliases.iter().map(|a| format!("{short}{a}")).collect();
    names.extend(arg.long_forms.iter().map(|l| format!("{long}{l}")));
    let mut out = names.join(", ");
    if !arg.flag {
        out.push_str(&format!(" <{}>", arg.value_type));
    }
    out
}

fn format_arg_help(arg: &ArgSchema) -> String {
    let mut parts: Vec<String> = Vec::new();
    let description = arg.description.trim();
    if !description.is_empty() {
        parts.push(description.to_string());
    }
    if arg.required && arg.position.is_none() {
        parts.push("(required)".to_string());
    }
    if !arg.possible_values.is_empty() {
        parts.push(format!("[possible values: {}]", arg.possible_values.join(", ")));
    }
    if let Some(default_value) = &arg.default_value {
        parts.push(format!("[default: {default_value}]"));
    }
    if let Some(env) = &arg.env {
        parts.push(format!("[env: {env}]"));
    }
    parts.join(" ")
}

fn push_rows<'a>(out: &mut String, indent: &str, args: impl Iterator<Item = &'a ArgSchema>, style: StyleSchema) {
    let rows: Vec<(String, String)> = args
        .map(|a| (format_arg_left(a, style), format_arg_help(a)))
        .collect();
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (left, help) in rows {
        if help.is_empty() {
            out.push_str(&format!("{indent}{left}\n"));
        } else {
            out.push_str(&format!("{indent}{left:width$}  {help}\n"));
        }
    }
}

/// Render a help message for a whole shape, actions included.
pub fn render(schema: &ShapeSchema) -> String {
    let exe = if schema.exe_name.is_empty() {
        schema.name.as_str()
    } else {
        schema.exe_name.as_str()
    };

    let mut out = String::new();
    if schema.description.trim().is_empty() {
        out.push_str(exe);
        out.push('\n');
    } else {
        out.push_str(&format!("{exe} - {}\n", schema.description.trim()));
    }

    // The selector is shown as `<action>`, not as an argument.
    let is_selector = |a: &&ArgSchema| !schema.actions.is_empty() && a.position == Some(0);
    if schema.actions.is_empty() {
        out.push_str(&format!("\nUsage: {exe} [OPTIONS]\n"));
    } else {
        out.push_str(&format!("\nUsage: {exe} <ACTION> [OPTIONS]\n"));
    }

    let options: Vec<&ArgSchema> = schema.args.iter().filter(|a| !is_selector(a)).collect();
    if !options.is_empty() {
        out.push_str("\nOptions:\n");
        push_rows(&mut out, "  ", options.into_iter(), schema.style);
    }

    if !schema.actions.is_empty() {
        out.push_str("\nActions:\n");
        for action in &schema.actions {
            let mut names = vec![action.name.clone()];
            names.extend(action.aliases.iter().cloned());
            let left = names.join(", ");
            if action.description.trim().is_empty() {
                out.push_str(&format!("  {left}\n"));
            } else {
                out.push_str(&format!("  {left}  {}\n", action.description.trim()));
            }
            push_rows(&mut out, "      ", action.args.iter(), schema.style);
        }
    }

    out
}
