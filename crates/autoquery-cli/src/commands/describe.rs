use crate::models::{Rockstar, RockstarAlbum};
use autoquery::{DatasetSchema, Model};
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct DescribeCommand {
    /// Print the schemas as JSON
    #[arg(long)]
    pub json: bool,
}

fn schemas() -> Vec<(&'static str, DatasetSchema)> {
    vec![
        (Rockstar::model_name(), Rockstar::schema()),
        (RockstarAlbum::model_name(), RockstarAlbum::schema()),
    ]
}

impl DescribeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        if self.json {
            let document: serde_json::Map<String, serde_json::Value> = schemas()
                .into_iter()
                .map(|(name, schema)| -> anyhow::Result<(String, serde_json::Value)> {
                    Ok((name.to_string(), serde_json::to_value(schema)?))
                })
                .collect::<anyhow::Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            return Ok(());
        }

        for (name, schema) in schemas() {
            println!("{}", name.bright_white().bold());
            for field in &schema.fields {
                let marker = if schema.primary_key_field() == Some(field.name.as_str()) {
                    " (primary key)".bright_yellow().to_string()
                } else {
                    String::new()
                };
                let nullable = if field.nullable { "?" } else { "" };
                println!(
                    "  {} {}{}{}",
                    field.name.bright_cyan(),
                    field.field_type,
                    nullable,
                    marker
                );
            }
            println!();
        }
        Ok(())
    }
}
