//! Atelier CLI

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use atelier::{
    bookings::{
        BookingStores, SlotAvailabilityEngine, blocks::BlockMatch, models::BookingType,
    },
    checkout::{
        CheckoutPricingPipeline,
        coupons::CouponEvaluator,
        exchange::{FallbackExchangeRates, NbpExchangeRateProvider},
        shipping::{ShippingRate, TableShippingRates},
    },
    clock::{Clock, FixedClock, SystemClock},
    config::EngineConfig,
    fixtures::{CartFixture, FixtureStores, VenueFixture},
    observability::{self, LogFormat},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::civil::{Date, DateTime};
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};

#[derive(Debug, Parser)]
#[command(name = "atelier", about = "Atelier booking and checkout CLI", long_about = None)]
struct Cli {
    /// Engine configuration file (YAML); built-in defaults when omitted
    #[arg(long, env = "ATELIER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Venue fixture file (YAML); an empty venue when omitted
    #[arg(long, env = "ATELIER_FIXTURE", global = true)]
    fixture: Option<PathBuf>,

    /// Pretend the venue-local time is this instead of the system time
    #[arg(long, global = true)]
    now: Option<DateTime>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    log_level: String,

    /// Log format (compact, json)
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate the slots of a month
    Generate(GenerateArgs),

    /// List bookable start times for a day
    Availability(AvailabilityArgs),

    /// Show every slot of a day with occupancy and blocks
    Overview(OverviewArgs),

    /// Price a cart against the fixture catalog
    Quote(QuoteArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    year: i16,

    #[arg(long)]
    month: i8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Sightseeing,
    Workshop,
}

impl From<KindArg> for BookingType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sightseeing => Self::Sightseeing,
            KindArg::Workshop => Self::Workshop,
        }
    }
}

#[derive(Debug, Args)]
struct AvailabilityArgs {
    #[arg(long)]
    date: Date,

    #[arg(long, value_enum, default_value_t = KindArg::Sightseeing)]
    kind: KindArg,

    #[arg(long, default_value_t = 1)]
    party: u32,
}

#[derive(Debug, Args)]
struct OverviewArgs {
    #[arg(long)]
    date: Date,
}

#[derive(Debug, Args)]
struct QuoteArgs {
    /// Cart file (YAML)
    #[arg(long)]
    cart: PathBuf,

    /// Coupon code, overriding the cart's
    #[arg(long)]
    coupon: Option<String>,

    /// Currency to charge in, overriding the cart's
    #[arg(long)]
    currency: Option<String>,

    /// Use the fallback exchange rate instead of fetching a live one
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(error) = observability::init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

struct Context {
    config: Arc<EngineConfig>,
    stores: FixtureStores,
    clock: Arc<dyn Clock>,
}

fn load(cli: &Cli) -> Result<Context, String> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .map_err(|error| format!("failed to load {}: {error}", path.display()))?,
        None => EngineConfig::default(),
    };

    let fixture = match &cli.fixture {
        Some(path) => VenueFixture::from_path(path)
            .map_err(|error| format!("failed to load {}: {error}", path.display()))?,
        None => VenueFixture::default(),
    };

    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(FixedClock::new(now)),
        None => Arc::new(SystemClock::new(
            config.time_zone().map_err(|error| error.to_string())?,
        )),
    };

    Ok(Context {
        config: Arc::new(config),
        stores: fixture.into_stores(),
        clock,
    })
}

async fn run(cli: Cli) -> Result<(), String> {
    let context = load(&cli)?;

    match cli.command {
        Commands::Generate(args) => generate(&context, &args).await,
        Commands::Availability(args) => availability(&context, &args).await,
        Commands::Overview(args) => overview(&context, &args).await,
        Commands::Quote(args) => quote(&context, args).await,
    }
}

fn engine(context: &Context) -> SlotAvailabilityEngine {
    SlotAvailabilityEngine::new(
        context.config.clone(),
        BookingStores::shared(context.stores.bookings.clone()),
        context.clock.clone(),
    )
}

async fn generate(context: &Context, args: &GenerateArgs) -> Result<(), String> {
    let created = engine(context)
        .generate_month(args.year, args.month)
        .await
        .map_err(|error| format!("failed to generate slots: {error}"))?;

    println!(
        "created {created} slots for {:04}-{:02}",
        args.year, args.month
    );

    Ok(())
}

async fn availability(context: &Context, args: &AvailabilityArgs) -> Result<(), String> {
    let engine = engine(context);
    let kind = BookingType::from(args.kind);

    let times = engine
        .list_bookable_start_times(args.date, kind, args.party)
        .await
        .map_err(|error| format!("failed to list availability: {error}"))?;

    if times.is_empty() {
        println!("no start times on {} for {} people", args.date, args.party);

        return Ok(());
    }

    for time in times {
        println!("{}", time.time().strftime("%H:%M"));
    }

    Ok(())
}

async fn overview(context: &Context, args: &OverviewArgs) -> Result<(), String> {
    let slots = engine(context)
        .slot_overview(args.date)
        .await
        .map_err(|error| format!("failed to load overview: {error}"))?;

    let mut builder = Builder::default();

    builder.push_record(["Start", "Capacity", "Occupied", "Remaining", "Blocked"]);

    for entry in &slots {
        builder.push_record([
            entry.slot.starts_at.time().strftime("%H:%M").to_string(),
            entry.slot.capacity.to_string(),
            entry.occupied.to_string(),
            entry.remaining.to_string(),
            block_label(entry.blocked_by).to_string(),
        ]);
    }

    let mut table = builder.build();

    table
        .with(Style::modern_rounded())
        .modify(Columns::new(1..4), Alignment::right());

    println!("{table}");

    Ok(())
}

fn block_label(block: Option<BlockMatch>) -> &'static str {
    match block {
        None => "",
        Some(BlockMatch::Slot) => "slot",
        Some(BlockMatch::Date(_)) => "date",
        Some(BlockMatch::Month(_)) => "month",
    }
}

async fn quote(context: &Context, args: QuoteArgs) -> Result<(), String> {
    let config = &context.config;
    let base = config.base_currency().map_err(|error| error.to_string())?;

    let mut cart = CartFixture::from_path(&args.cart)
        .map_err(|error| format!("failed to load {}: {error}", args.cart.display()))?;

    if args.coupon.is_some() {
        cart.coupon = args.coupon;
    }

    if args.currency.is_some() {
        cart.currency = args.currency;
    }

    let request = cart.into_request(base).map_err(|error| error.to_string())?;

    let rates = if args.offline {
        FallbackExchangeRates::offline(config.checkout.fallback_exchange_rate)
    } else {
        let provider = NbpExchangeRateProvider::new(
            config.checkout.exchange_rate_url.clone(),
            Duration::from_secs(config.checkout.exchange_rate_timeout_seconds),
        )
        .map_err(|error| error.to_string())?;

        FallbackExchangeRates::new(Arc::new(provider), config.checkout.fallback_exchange_rate)
    };

    let shipping =
        TableShippingRates::from_config(&config.checkout, base).map_err(|error| error.to_string())?;
    let fallback_shipping = ShippingRate::from_config(&config.checkout.fallback_shipping, base)
        .map_err(|error| error.to_string())?;

    let pipeline = CheckoutPricingPipeline::new(
        context.stores.catalog.clone(),
        CouponEvaluator::new(context.stores.orders.clone()),
        Arc::new(shipping),
        rates,
        base,
        fallback_shipping,
    );

    let priced = pipeline
        .price(&request)
        .await
        .map_err(|error| format!("cart rejected ({}): {error}", error.code()))?;

    println!("{}", priced.summary_table());

    if let (Some(rate), Some(source)) = (priced.exchange_rate(), priced.rate_source()) {
        println!(
            "exchange rate: {rate} {} per {} ({source})",
            base.iso_alpha_code,
            priced.currency().iso_alpha_code
        );
    }

    Ok(())
}
