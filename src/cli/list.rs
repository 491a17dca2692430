use std::error::Error;
use std::io::{self, Write};

use unicode_width::UnicodeWidthStr;

use crate::core::config::data::{path_display, Config};
use crate::template::{TemplateLoader, TemplateSummary};

pub fn list_templates(config: &Config) -> Result<(), Box<dyn Error>> {
    let loader = TemplateLoader::from_config(config);
    let mut stdout = io::stdout().lock();
    write_listing(&loader, &loader.list(), &mut stdout)?;
    Ok(())
}

/// Writes one `name  summary` line per template, names padded to a column.
pub fn write_listing<W: Write>(
    loader: &TemplateLoader,
    templates: &[TemplateSummary],
    out: &mut W,
) -> io::Result<()> {
    if templates.is_empty() {
        writeln!(out, "No templates found. Searched:")?;
        for dir in loader.dirs() {
            writeln!(out, "  {}", path_display(dir))?;
        }
        return Ok(());
    }

    let width = templates
        .iter()
        .map(|t| UnicodeWidthStr::width(t.name.as_str()))
        .max()
        .unwrap_or(0);

    for template in templates {
        let pad = width - UnicodeWidthStr::width(template.name.as_str());
        if template.summary.is_empty() {
            writeln!(out, "{}", template.name)?;
        } else {
            writeln!(
                out,
                "{}{}  {}",
                template.name,
                " ".repeat(pad),
                template.summary
            )?;
        }
    }
    Ok(())
}
