use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use capital_riesgo::filter::parse_filter_date;
use capital_riesgo::{
    explore, export_to_path, filter_options, load_dataset, metrics, table_view, Column,
    DashboardConfig, EntityType, FilterSpec, SortDirection, TableQuery,
};

#[derive(Parser, Debug)]
#[command(name = "capital-riesgo")]
#[command(version)]
#[command(about = "Explore the CNMV venture-capital entity registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the metric bundle for the selection
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print filter choices, narrowed by entity type
    Options {
        /// Entity type (e.g. "Fondos de capital-riesgo")
        #[arg(long = "type", value_name = "LABEL")]
        entity_type: Option<EntityType>,
    },

    /// Print the data explorer table
    Table(TableArgs),

    /// Write the searched and sorted records as CSV
    Export {
        /// Output file
        out: PathBuf,

        #[command(flatten)]
        table: TableArgs,
    },
}

/// Sidebar filters, combined with AND
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Entity type (e.g. "Fondos de capital-riesgo")
    #[arg(long = "type", value_name = "LABEL")]
    entity_type: Option<EntityType>,

    /// Managing company
    #[arg(long)]
    gestora: Option<String>,

    /// Depositary
    #[arg(long)]
    depositaria: Option<String>,

    /// Registration date lower bound (YYYY-MM-DD or DD/MM/YYYY)
    #[arg(long = "from", value_name = "DATE", value_parser = parse_filter_date)]
    date_from: Option<NaiveDate>,

    /// Registration date upper bound
    #[arg(long = "to", value_name = "DATE", value_parser = parse_filter_date)]
    date_to: Option<NaiveDate>,
}

impl FilterArgs {
    fn filter_spec(&self) -> FilterSpec {
        FilterSpec {
            entity_type: self.entity_type,
            gestora: self.gestora.clone(),
            depositaria: self.depositaria.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

#[derive(Args, Debug)]
struct TableArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Entity name search (case-insensitive substring)
    #[arg(long = "q", value_name = "TEXT")]
    search: Option<String>,

    /// Displayed columns, comma separated
    #[arg(long, value_delimiter = ',', value_name = "COLUMNS")]
    columns: Vec<Column>,

    /// Sort column
    #[arg(long, value_name = "COLUMN")]
    sort: Option<Column>,

    /// Sort direction (asc or desc)
    #[arg(long)]
    order: Option<SortDirection>,

    /// Group share classes by entity (defaults to on unless class columns are shown)
    #[arg(long, value_name = "true|false")]
    group: Option<bool>,
}

impl TableArgs {
    fn table_query(&self) -> TableQuery {
        let defaults = TableQuery::default();
        TableQuery {
            filter: self.filter.filter_spec(),
            search: self.search.clone().filter(|q| !q.is_empty()),
            columns: if self.columns.is_empty() {
                defaults.columns
            } else {
                self.columns.clone()
            },
            sort_by: self.sort,
            direction: self.order.unwrap_or_default(),
            group_by_entity: self.group,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    capital_riesgo::init_tracing();

    let cli = Cli::parse();
    let config = DashboardConfig::from_env()?;

    match cli.command {
        Commands::Summary { filter } => run_summary(&config, &filter.filter_spec()),
        Commands::Options { entity_type } => run_options(&config, entity_type),
        Commands::Table(table) => run_table(&config, &table.table_query()),
        Commands::Export { out, table } => run_export(&config, &table.table_query(), out),
    }
}

fn run_summary(config: &DashboardConfig, filter: &FilterSpec) -> Result<()> {
    let dataset = load_dataset(&config.dataset_path)?;
    let bundle = metrics(&dataset.all(), filter, &config.stats);

    println!("📊 Dashboard de Entidades de Capital Riesgo");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Datos actualizados: {}", dataset.freshness_label());

    let o = &bundle.overview;
    println!("\n✓ Entidades:        {} ({} registros)", o.entity_count, o.record_count);
    println!("✓ Tipos de entidad: {}", o.entity_type_count);
    println!("✓ Gestoras:         {}", o.gestora_count);
    println!("✓ Depositarias:     {}", o.depositaria_count);
    println!("✓ Último registro:  {}", o.latest_registration_label);

    let c = &bundle.coverage;
    println!("\n📋 Cobertura");
    println!("   ISIN:        {} ({:.1}%)", c.isin.present, c.isin.percentage);
    println!("   Folleto:     {} ({:.1}%)", c.folleto.present, c.folleto.percentage);
    println!("   Gestora:     {} ({:.1}%)", c.gestora.present, c.gestora.percentage);
    println!("   Depositaria: {} ({:.1}%)", c.depositaria.present, c.depositaria.percentage);

    println!("\n🏢 Top {} gestoras", config.stats.top_gestoras);
    for (i, g) in bundle.top_gestoras.iter().enumerate() {
        println!("   {:>2}. {} ({})", i + 1, g.name, g.count);
    }

    println!("\n🔗 Gestoras más conectadas");
    for g in &bundle.connectivity {
        println!("   {} → {} depositarias", g.name, g.count);
    }

    let conc = &bundle.concentration;
    println!("\n📈 Concentración del mercado");
    println!("   Cuota top {}:       {:.1}%", conc.top_n, conc.top_share_percentage);
    println!("   Índice Herfindahl: {:.4}", conc.herfindahl);

    Ok(())
}

fn run_options(config: &DashboardConfig, entity_type: Option<EntityType>) -> Result<()> {
    let dataset = load_dataset(&config.dataset_path)?;
    let options = filter_options(&dataset.all(), entity_type);

    println!("Tipos de entidad:");
    for t in &options.entity_types {
        println!("  - {}", t);
    }
    if let Some(description) = options.entity_type_description {
        println!("\n{}", description);
    }
    println!("\nGestoras ({}):", options.gestoras.len());
    for g in &options.gestoras {
        println!("  - {}", g);
    }
    println!("\nDepositarias ({}):", options.depositarias.len());
    for d in &options.depositarias {
        println!("  - {}", d);
    }
    if let Some(bounds) = options.date_bounds {
        println!(
            "\nFechas de registro: {} - {}",
            bounds.min.format("%d/%m/%Y"),
            bounds.max.format("%d/%m/%Y")
        );
    }

    Ok(())
}

fn run_table(config: &DashboardConfig, query: &TableQuery) -> Result<()> {
    let dataset = load_dataset(&config.dataset_path)?;
    let view = table_view(&dataset.all(), query);

    println!("{}", view.columns.join(" | "));
    for row in view.display_rows() {
        println!("{}", row.join(" | "));
    }
    println!("\nMostrando {}", view.row_count_label);

    Ok(())
}

fn run_export(config: &DashboardConfig, query: &TableQuery, output: PathBuf) -> Result<()> {
    let dataset = load_dataset(&config.dataset_path)?;
    let all = dataset.all();
    let rows = explore(&all, query);

    let written = export_to_path(&output, &rows, &query.columns)?;
    println!("✓ Exported {} records to {}", written, output.display());

    Ok(())
}
