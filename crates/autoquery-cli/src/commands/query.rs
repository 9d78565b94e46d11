use crate::models::{QueryAlbums, QueryRockstarAlbums, QueryRockstars, Rockstar, RockstarAlbum};
use autoquery::{
    write_csv_stream, AutoQuery, AutoQueryConfig, ConnectionConfig, DataSourceFactory, QueryBase,
    QueryRequest, RequestContext,
};
use autoquery_memory::MemorySourceFactory;
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Target {
    /// Rockstars
    Rockstars,
    /// Rockstars left joined with their albums
    RockstarAlbums,
    /// Albums
    Albums,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Response envelope as JSON
    Json,
    /// Rows only, as CSV
    Csv,
}

#[derive(Args)]
pub struct QueryCommand {
    /// JSON dataset of the form {"Rockstar": [...], "RockstarAlbum": [...]}
    #[arg(long, env = "AUTOQUERY_DATA")]
    pub data: PathBuf,

    /// What to query
    #[arg(long, value_enum, default_value = "rockstars")]
    pub target: Target,

    /// Filter as key=value, e.g. `AgeOlderThan=30` or `FirstNames=Jimi,Kurt`
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    #[arg(long)]
    pub skip: Option<usize>,

    #[arg(long)]
    pub take: Option<usize>,

    /// Comma separated columns, `-Column` for descending
    #[arg(long)]
    pub order_by: Option<String>,

    #[arg(long)]
    pub order_by_desc: Option<String>,

    /// Comma separated columns to return
    #[arg(long)]
    pub fields: Option<String>,

    /// Aggregates, e.g. `COUNT(*), MAX(Age) as Oldest`
    #[arg(long)]
    pub include: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Largest page a query may return; 0 disables the cap
    #[arg(long, env = "AUTOQUERY_MAX_LIMIT", default_value_t = 100)]
    pub max_limit: usize,

    /// Reject params that do not map to any field
    #[arg(long)]
    pub strict: bool,

    /// Abort queries that take longer than this
    #[arg(long, env = "AUTOQUERY_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

impl QueryCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn config(&self) -> AutoQueryConfig {
        let max_limit = (self.max_limit > 0).then_some(self.max_limit);
        let config = AutoQueryConfig::default()
            .with_max_limit(max_limit)
            .with_strict(self.strict);
        match self.timeout_ms {
            Some(timeout_ms) => config.with_default_timeout_ms(timeout_ms),
            None => config,
        }
    }

    fn base(&self) -> QueryBase {
        QueryBase {
            skip: self.skip,
            take: self.take,
            order_by: self.order_by.clone(),
            order_by_desc: self.order_by_desc.clone(),
            fields: self.fields.clone(),
            include: self.include.clone(),
        }
    }

    fn build(&self) -> anyhow::Result<AutoQuery> {
        let connection =
            ConnectionConfig::new("memory").with_url(self.data.to_string_lossy().into_owned());
        let source = MemorySourceFactory.create_source(&connection)?;

        let autoquery = AutoQuery::builder(self.config())
            .add_data_source::<Rockstar>(source.clone())
            .add_data_source::<RockstarAlbum>(source)
            .register::<QueryRockstars>()?
            .register::<QueryRockstarAlbums>()?
            .register::<QueryAlbums>()?
            .build()?;
        Ok(autoquery)
    }

    async fn run(self) -> anyhow::Result<()> {
        let autoquery = self.build()?;
        let params: HashMap<String, String> = self.params.iter().cloned().collect();

        let token = CancellationToken::new();
        let ctx = RequestContext::new().with_cancellation(token.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling query");
                token.cancel();
            }
        });

        let base = self.base();
        match self.target {
            Target::Rockstars => {
                let dto = QueryRockstars { base };
                self.print(&autoquery, &dto, &params, &ctx).await?;
            }
            Target::RockstarAlbums => {
                let dto = QueryRockstarAlbums { base };
                self.print(&autoquery, &dto, &params, &ctx).await?;
            }
            Target::Albums => {
                let dto = QueryAlbums { base };
                self.print(&autoquery, &dto, &params, &ctx).await?;
            }
        }

        autoquery.close().await?;
        Ok(())
    }

    async fn print<R>(
        &self,
        autoquery: &AutoQuery,
        dto: &R,
        params: &HashMap<String, String>,
        ctx: &RequestContext,
    ) -> anyhow::Result<()>
    where
        R: QueryRequest,
        R::Into: Default,
    {
        let started = std::time::Instant::now();
        let expr = autoquery.create_query(dto, params, ctx)?;
        debug!("Compiled expression: {:?}", expr.render_where());

        match self.format {
            OutputFormat::Json => {
                let response = autoquery.execute(dto, expr, ctx).await?;
                print_json(&response)?;
                eprintln!(
                    "{} {} of {} rows in {}",
                    "✓".bright_green(),
                    response.results.len(),
                    response.total.to_string().bright_white().bold(),
                    format_elapsed(started.elapsed())
                );
            }
            OutputFormat::Csv => {
                let rows = autoquery.stream(dto, expr, ctx).await?;
                write_csv_stream(rows, std::io::stdout()).await?;
            }
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_millis() > 0 {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{}µs", elapsed.as_micros())
    }
}
