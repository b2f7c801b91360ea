use std::path::PathBuf;

use anyhow::{Context as _, Result};
use staffdesk_engine::{
    campaign::{seller_name, CampaignView},
    compute_progression,
    fulfillment::{Action, OrderView},
    types::Address,
    Stepper,
};
use staffdesk_server::{ApiError, BackendClient, Session, SessionStore, DEFAULT_API_URL};
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(name = "staffdesk", about = "Order fulfillment and campaign moderation for staff")]
struct Cli {
    /// Operations backend base URL.
    /// Defaults to the backend of the stored session, then the production backend.
    #[structopt(long, env = "STAFFDESK_API_URL")]
    api_url: Option<String>,

    /// Session token; overrides the stored session
    #[structopt(long, env = "STAFFDESK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output as JSON
    #[structopt(long, global = true)]
    json: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Log in with staff credentials and store the session
    Login {
        #[structopt(long)]
        email: String,
        /// Read from stdin when omitted
        #[structopt(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List seller orders in the fulfillment queue
    Orders {
        #[structopt(long, default_value = "1")]
        page: u32,
        #[structopt(long, default_value = "20")]
        limit: u32,
    },
    /// Show one seller order with its progress and next actions
    Order { id: u64 },
    /// Confirm a COD order and accept it
    ConfirmCod {
        id: u64,
        #[structopt(long, default_value = "")]
        remarks: String,
    },
    /// Mark an accepted order as packed
    Pack { id: u64 },
    /// Hand a packed order to the carrier
    Ship { id: u64 },
    /// Download the order's invoice PDF
    Invoice {
        id: u64,
        /// Defaults to `invoice-<id>.pdf`
        #[structopt(long, parse(from_os_str))]
        out: Option<PathBuf>,
    },
    /// List ad campaigns
    Campaigns {
        /// Only campaigns awaiting review
        #[structopt(long)]
        pending: bool,
    },
    /// Show one campaign with its credit usage and latest review
    Campaign { id: u64 },
    /// Approve a pending campaign
    Approve { id: u64 },
    /// Reject a pending campaign
    Reject {
        id: u64,
        #[structopt(long)]
        reason: String,
    },
    /// Show how a status projects onto the fulfillment progression
    Progress { status: String },
}

impl Command {
    /// Whether the command sends the session token to the backend.
    fn uses_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Logout | Command::Progress { .. }
        )
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .map(ApiError::is_unauthorized)
        .unwrap_or(false)
}

/// A refused login reports the backend's message.
fn login_failure(err: ApiError) -> anyhow::Error {
    anyhow::Error::msg(err.user_message())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_file(true)
        .with_line_number(true)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::from_args();
    tracing::debug!("arguments parsed: {:?}", cli.command);

    let store = SessionStore::default_location();
    let explicit_token = cli.token.is_some();
    let uses_session = cli.command.uses_session();
    match run(cli, &store).await {
        Err(e) if uses_session && is_unauthorized(&e) => {
            if explicit_token {
                anyhow::bail!("the backend rejected the token given by --token or STAFFDESK_TOKEN");
            }
            warn!("session rejected by the backend, clearing it");
            store.clear().await?;
            anyhow::bail!("session expired or invalid; run `staffdesk login` again");
        }
        result => result,
    }
}

async fn run(cli: Cli, store: &SessionStore) -> Result<()> {
    let stored = store.load().await?;
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| stored.as_ref().map(|s| s.api_url.clone()))
        .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
    let token = cli.token.clone().or(stored.map(|s| s.token));
    let client = BackendClient::new(api_url);
    let authed = || -> Result<BackendClient> {
        let token = token
            .as_deref()
            .context("not logged in; run `staffdesk login` first")?;
        Ok(client.with_token(token))
    };

    match cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let response = client
                .login(&email, &password)
                .await
                .map_err(login_failure)?;
            store
                .save(&Session {
                    token: response.token,
                    api_url: client.base_url().to_owned(),
                })
                .await?;
            println!("Logged in as {}", email);
        }
        Command::Logout => {
            store.clear().await?;
            println!("Logged out");
        }
        Command::Orders { page, limit } => {
            let orders = authed()?.seller_orders(page, limit).await?.orders;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&orders)?);
                return Ok(());
            }
            println!("Active orders: {}", orders.len());
            if orders.is_empty() {
                println!("No orders found in queue");
            }
            for o in &orders {
                let tat = match (o.shipping_tat_min, o.shipping_tat_max) {
                    (Some(min), Some(max)) => format!("  TAT {}-{} days", min, max),
                    (Some(min), None) => format!("  TAT {}+ days", min),
                    _ => String::new(),
                };
                println!(
                    "#{:<6} {:<10} {} | {}  amount {}  shipping {}{}",
                    o.id,
                    o.status,
                    o.order.user.name,
                    o.order.user.phone,
                    o.total_amount.rupees(),
                    o.shipping_charge.rupees(),
                    tat
                );
            }
        }
        Command::Order { id } => {
            let view = OrderView::new(authed()?.seller_order(id).await?);
            print_order(&view, cli.json)?;
        }
        Command::ConfirmCod { id, remarks } => {
            fulfill(&authed()?, id, Action::ConfirmCod, Some(&remarks), cli.json).await?;
        }
        Command::Pack { id } => {
            fulfill(&authed()?, id, Action::MarkPacked, None, cli.json).await?;
        }
        Command::Ship { id } => {
            fulfill(&authed()?, id, Action::CreateShipment, None, cli.json).await?;
        }
        Command::Invoice { id, out } => {
            let pdf = authed()?.invoice(id).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("invoice-{}.pdf", id)));
            tokio::fs::write(&out, &pdf)
                .await
                .with_context(|| format!("failed to write `{}`", out.display()))?;
            println!("Saved {} ({} bytes)", out.display(), pdf.len());
        }
        Command::Campaigns { pending } => {
            let client = authed()?;
            let campaigns = if pending {
                client.pending_campaigns().await?
            } else {
                client.all_campaigns().await?
            };
            let views: Vec<CampaignView> = campaigns.into_iter().map(CampaignView::new).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&views)?);
                return Ok(());
            }
            if views.is_empty() {
                println!("{}", empty_campaigns_message(pending));
            }
            for v in &views {
                println!(
                    "#{:<5} {:<24} {:<20} {:<10} spent {:>6}  remaining {:>6}",
                    v.campaign.id,
                    v.campaign.name,
                    seller_name(&v.campaign),
                    v.campaign.status,
                    v.usage.spent,
                    v.usage.remaining
                );
            }
        }
        Command::Campaign { id } => {
            let view = CampaignView::new(authed()?.campaign(id).await?);
            print_campaign(&view, cli.json)?;
        }
        Command::Approve { id } => {
            authed()?.approve_campaign(id).await?;
            println!("Campaign {} approved", id);
        }
        Command::Reject { id, reason } => {
            if reason.trim().is_empty() {
                anyhow::bail!("a rejection reason is required");
            }
            authed()?.reject_campaign(id, &reason).await?;
            println!("Campaign {} rejected", id);
        }
        Command::Progress { status } => {
            let progression = compute_progression(&status);
            if progression.is_unrecognized() {
                warn!("`{}` is not a known order status", status);
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&progression)?);
                return Ok(());
            }
            println!("{}", Stepper::from(&progression));
        }
    }
    Ok(())
}

fn empty_campaigns_message(pending: bool) -> &'static str {
    if pending {
        "No campaigns awaiting review"
    } else {
        "No campaigns found"
    }
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

async fn fulfill(
    client: &BackendClient,
    id: u64,
    action: Action,
    remarks: Option<&str>,
    json: bool,
) -> Result<()> {
    let view = OrderView::new(client.seller_order(id).await?);
    if !view.allows(action) {
        anyhow::bail!(
            "{} is not available for order #{} in {} state",
            action,
            id,
            view.order.status
        );
    }
    client.fulfill(id, action, remarks).await?;
    info!("{} done for order {}", action, id);
    println!("{}", action.success_message());
    let view = OrderView::new(client.seller_order(id).await?);
    print_order(&view, json)
}

fn format_address(address: &Address) -> Vec<String> {
    let mut lines = vec![];
    if let Some(line1) = &address.address_line1 {
        lines.push(line1.clone());
    }
    if let Some(line2) = &address.address_line2 {
        lines.push(line2.clone());
    }
    if let Some(landmark) = &address.landmark {
        lines.push(format!("Landmark: {}", landmark));
    }
    let city = [&address.city, &address.state]
        .iter()
        .filter_map(|p| p.as_deref())
        .collect::<Vec<_>>()
        .join(", ");
    match &address.pincode {
        Some(pin) => lines.push(format!("{} - {}", city, pin)),
        None if !city.is_empty() => lines.push(city),
        None => {}
    }
    lines
}

fn print_order(view: &OrderView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }
    let order = &view.order;
    println!("Order #{}  placed {}", order.id, order.created_at.format("%Y-%m-%d"));
    println!();
    println!("{}", view.stepper);
    println!();

    if view.actions.is_empty() {
        println!("No active actions required for {} state", order.status);
    }
    for action in &view.actions {
        println!("Next: {}  (staffdesk {} {})", action.label(), command_for(*action), order.id);
    }
    println!();

    println!("Items ({}):", order.items.len());
    for item in &order.items {
        let title = item
            .product
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .unwrap_or("(untitled)");
        println!(
            "  {:<32} x{:<3} {:>12} {:>12}",
            title,
            item.quantity,
            item.unit_price.rupees(),
            item.subtotal().rupees()
        );
    }
    println!("  Items subtotal:  {}", view.pricing.items_subtotal.rupees());
    println!("  Shipping charge: {}", view.pricing.shipping_charge.rupees());
    println!("  Order total:     {}", view.pricing.total.rupees());
    println!();

    println!("Payment: {}", order.payment_method().unwrap_or("N/A"));
    if view.recovered_payment {
        println!("  ! Failed online payment. Recovered as manual COD confirmation.");
    }
    if let Some(tracking) = order.shipment.as_ref().and_then(|s| s.tracking_id.as_deref()) {
        let shipment = order.shipment.as_ref();
        println!(
            "Shipment: {} via {} ({})",
            tracking,
            shipment.and_then(|s| s.courier.as_deref()).unwrap_or("N/A"),
            shipment.and_then(|s| s.status.as_deref()).unwrap_or("N/A")
        );
    }

    println!(
        "Deliver to: {} ({})",
        view.delivery.full_name.as_deref().unwrap_or("N/A"),
        view.delivery.phone.as_deref().unwrap_or("N/A")
    );
    for line in format_address(&view.delivery) {
        println!("  {}", line);
    }

    if let Some(seller) = &order.seller {
        println!(
            "Seller: {}  GST: {}  phone: {}",
            seller.display_name().unwrap_or("N/A"),
            seller.gst_number.as_deref().unwrap_or("No GST"),
            seller.phone.as_deref().unwrap_or("N/A")
        );
    }
    if let Some(pickup) = &view.pickup {
        println!("Pickup from:");
        for line in format_address(pickup) {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn command_for(action: Action) -> &'static str {
    match action {
        Action::ConfirmCod => "confirm-cod",
        Action::MarkPacked => "pack",
        Action::CreateShipment => "ship",
    }
}

fn print_campaign(view: &CampaignView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }
    let c = &view.campaign;
    println!("{}  (#{}, {})", c.name, c.id, c.status);
    if let Some(seller) = &c.seller {
        println!(
            "Seller: {} <{}> {}  {}",
            seller.name,
            seller.email.as_deref().unwrap_or("-"),
            seller.phone.as_deref().unwrap_or("-"),
            seller.business_name.as_deref().unwrap_or("")
        );
    }
    println!(
        "Budget {}  consumed {}  remaining {}",
        view.usage.budget, view.usage.spent, view.usage.remaining
    );
    for p in &c.products {
        let title = p
            .product
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .unwrap_or("(untitled)");
        println!(
            "  {:<32} allocated {:>6}  spent {:>6}  remaining {:>6}",
            title,
            p.allocated_credits,
            p.spent(),
            p.remaining_credits
        );
    }
    match &view.latest_review {
        Some(review) => {
            println!(
                "Latest review: {:?} at {}",
                review.action,
                review.created_at.format("%Y-%m-%d %H:%M")
            );
            if let Some(note) = &review.note {
                println!("  \"{}\"", note);
            }
            if let Some(employee) = &review.employee {
                println!("  Handled by: {}", employee.name);
            }
        }
        None => println!("No reviews yet"),
    }
    Ok(())
}
