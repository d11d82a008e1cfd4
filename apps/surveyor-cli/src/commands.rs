//! Command handlers

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use surveyor_core::{
    submit_scan, MarkingTool, ObjectFit, Rect, RenderedImage, Route, RouteDecision,
    ScanSubmission, SignUp, Size, VerificationFlow,
};
use surveyor_types::{
    format_cost, Angle, CarDocuments, DamageDraft, DamageType, ImageUpload, NewCar,
    UploadProgress,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app::App;

/// A point in the frame the image is laid out in, written `X,Y`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y, got {s}"))?;
        let parse = |v: &str| v.trim().parse::<f64>().map_err(|_| format!("not a number: {v}"));
        Ok(Point {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

/// Width and height, written `WxH`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl FromStr for Dimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s}"))?;
        let parse = |v: &str| match v.trim().parse::<f64>() {
            Ok(n) if n > 0.0 => Ok(n),
            _ => Err(format!("not a positive size: {v}")),
        };
        Ok(Dimensions {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Fit {
    Fill,
    Contain,
    Cover,
}

impl From<Fit> for ObjectFit {
    fn from(fit: Fit) -> Self {
        match fit {
            Fit::Fill => ObjectFit::Fill,
            Fit::Contain => ObjectFit::Contain,
            Fit::Cover => ObjectFit::Cover,
        }
    }
}

/// Where a hand-marked damage was clicked
#[derive(Debug, Clone, Copy)]
pub struct Click {
    pub at: Point,
    pub frame: Dimensions,
    pub natural: Option<Dimensions>,
    pub fit: Fit,
}

/// Build the draft for a hand-marked damage, placing it through the marking
/// tool when a click is given
pub fn mark(
    damage_type: &str,
    part: &str,
    notes: Option<&str>,
    click: Option<Click>,
) -> Result<DamageDraft> {
    let Some(click) = click else {
        let draft = DamageDraft::new(DamageType::parse(damage_type), part);
        return Ok(match notes {
            Some(notes) => draft.with_notes(notes),
            None => draft,
        });
    };

    let natural = click.natural.unwrap_or(click.frame);
    let mut tool = MarkingTool::new(RenderedImage::new(
        Rect::new(0.0, 0.0, click.frame.width, click.frame.height),
        Size::new(natural.width, natural.height),
        click.fit.into(),
    ));
    tool.click(click.at.x, click.at.y).ok_or_else(|| {
        anyhow!(
            "({}, {}) is not on the image in a {} frame",
            click.at.x,
            click.at.y,
            click.frame
        )
    })?;
    tool.set_type(DamageType::parse(damage_type));
    tool.set_part(part);
    if let Some(notes) = notes {
        tool.set_notes(notes);
    }
    let marked = tool.commit()?;
    Ok(DamageDraft::from(&marked))
}

async fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(ImageUpload::from_bytes(name, bytes))
}

pub async fn login(app: &mut App, email: &str, password: &str) -> Result<()> {
    let mut context = app.session_context()?;
    let session = context.sign_in(email, password).await?;
    println!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id));
    app.adopt(&context)
}

pub async fn signup(app: &mut App, email: &str, password: &str) -> Result<()> {
    let mut context = app.session_context()?;
    match context.sign_up(email, password).await? {
        SignUp::SignedIn => println!("Account created, you are signed in"),
        SignUp::NeedsConfirmation => {
            println!("Account created. Check your email to confirm it, then run `surveyor login`")
        }
    }
    app.adopt(&context)
}

pub async fn logout(app: &mut App) -> Result<()> {
    match app.session_context() {
        Ok(mut context) => {
            context.sign_out().await;
            app.adopt(&context)?;
        }
        Err(err) => {
            warn!(error = %err, "Clearing the local session only");
            app.forget()?;
        }
    }
    println!("Signed out");
    Ok(())
}

pub fn route(app: &App, path: &str) -> Result<()> {
    let route: Route = path.parse().map_err(|e: String| anyhow!(e))?;
    match app.guard(&route) {
        RouteDecision::Render(route) => println!("render {route}"),
        RouteDecision::Redirect(to) => println!("redirect {to}"),
    }
    Ok(())
}

pub async fn scan(app: &App, image: &Path, car: &str) -> Result<()> {
    let session = app.enter(&Route::NewScan)?;
    let inference = app.inference()?;
    let upload = read_image(image).await?;
    let submission = ScanSubmission::for_session(&session, upload, car);

    let (tx, mut rx) = watch::channel(UploadProgress::default());
    let last = rx.clone();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow_and_update();
            eprint!("\rUploading... {:>3}%", progress.percent());
        }
    });

    let submitted = submit_scan(&inference, submission, Some(tx)).await;
    printer.abort();
    eprintln!("\rUploading... {:>3}%", last.borrow().percent());

    let submitted = submitted?;
    println!(
        "Scan {} created with {} damage(s), estimate ₹{}",
        submitted.scan_id,
        submitted.analysis.damages.len(),
        format_cost(submitted.analysis.total_cost.unwrap_or(0.0))
    );
    println!("Next: surveyor report {}  ({})", submitted.scan_id, submitted.route);
    Ok(())
}

pub async fn dashboard(app: &App) -> Result<()> {
    let session = app.enter(&Route::Dashboard)?;
    let scans = app.garage(&session)?.scans(&session).await?;
    if scans.is_empty() {
        println!("No scans yet. Start one with `surveyor scan <image> --car <name>`");
        return Ok(());
    }
    for scan in scans {
        let date = scan
            .created_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<20} {:>3} damage(s)  ₹{:>10}  {}",
            scan.id,
            scan.car_name,
            scan.damage_count,
            format_cost(scan.total_cost),
            date
        );
    }
    Ok(())
}

pub async fn report(app: &App, scan_id: &str) -> Result<()> {
    let session = app.enter(&Route::ScanDetail(scan_id.to_string()))?;
    let mut store = app.store(&session)?;
    store.open(scan_id).await?;
    let report = store
        .report()
        .ok_or_else(|| anyhow!("scan {scan_id} is not loaded"))?;
    print!("{report}");
    Ok(())
}

pub async fn add_damage(app: &App, scan_id: &str, draft: DamageDraft) -> Result<()> {
    let session = app.enter(&Route::ScanDetail(scan_id.to_string()))?;
    let mut store = app.store(&session)?;
    let outcome = store.add(scan_id, draft).await?;
    println!(
        "Added {} on {} ({})",
        outcome.damage.damage_type, outcome.damage.part_name, outcome.damage.id
    );
    if !outcome.aggregates_synced {
        warn!("Scan totals were not updated, run `surveyor damage verify` or reload later");
    }
    if outcome.requires_verification {
        println!(
            "Verify it with three close-ups: surveyor damage verify {scan_id} {} --left <img> --center <img> --right <img>",
            outcome.damage.id
        );
    }
    Ok(())
}

pub async fn delete_damage(app: &App, scan_id: &str, damage_id: &str) -> Result<()> {
    let session = app.enter(&Route::ScanDetail(scan_id.to_string()))?;
    let mut store = app.store(&session)?;
    store.open(scan_id).await?;
    let outcome = store.remove(scan_id, damage_id).await?;
    println!(
        "Deleted {} on {}. Scan total ₹{} across {} damage(s)",
        outcome.removed.damage_type,
        outcome.removed.part_name,
        format_cost(outcome.aggregates.total_cost),
        outcome.aggregates.damage_count
    );
    if !outcome.aggregates_synced {
        warn!("Scan totals were not written back");
    }
    Ok(())
}

pub struct CloseUps {
    pub left: PathBuf,
    pub center: PathBuf,
    pub right: PathBuf,
}

pub async fn verify_damage(
    app: &App,
    scan_id: &str,
    damage_id: &str,
    photos: CloseUps,
) -> Result<()> {
    let session = app.enter(&Route::ScanDetail(scan_id.to_string()))?;
    let mut store = app.store(&session)?;
    store.open(scan_id).await?;
    let damage = store
        .find(damage_id)
        .ok_or_else(|| anyhow!("damage {damage_id} is not part of scan {scan_id}"))?;

    let mut flow = VerificationFlow::new();
    flow.open(damage);
    for (angle, path) in [
        (Angle::Left, &photos.left),
        (Angle::Center, &photos.center),
        (Angle::Right, &photos.right),
    ] {
        flow.attach(angle, read_image(path).await?)?;
    }

    info!(damage_id, "Submitting close-ups");
    let result = flow.submit(&mut store).await?;
    println!("{}", result.summary());
    if let Some(scan) = store.scan() {
        println!(
            "Scan total is now ₹{} across {} damage(s)",
            format_cost(scan.total_cost),
            scan.damage_count
        );
    }
    Ok(())
}

pub async fn list_cars(app: &App) -> Result<()> {
    let session = app.enter(&Route::Dashboard)?;
    let cars = app.garage(&session)?.cars().await?;
    if cars.is_empty() {
        println!("No cars in the garage");
    }
    for car in cars {
        println!("{:<12} {:<24} {}", car.id, car.model_name, car.reg_number);
    }
    Ok(())
}

/// Files given with `garage add`
#[derive(Debug, Default)]
pub struct CarFiles {
    pub photo: Option<PathBuf>,
    pub insurance: Option<PathBuf>,
    pub rc: Option<PathBuf>,
}

async fn read_optional(path: Option<&Path>) -> Result<Option<ImageUpload>> {
    match path {
        Some(path) => Ok(Some(read_image(path).await?)),
        None => Ok(None),
    }
}

pub async fn add_car(app: &App, car: NewCar, files: CarFiles) -> Result<()> {
    let session = app.enter(&Route::Dashboard)?;
    let documents = CarDocuments {
        photo: read_optional(files.photo.as_deref()).await?,
        insurance: read_optional(files.insurance.as_deref()).await?,
        rc: read_optional(files.rc.as_deref()).await?,
    };
    let stored = app.garage(&session)?.add_car(car, documents).await?;
    println!("Added {} ({}) as {}", stored.model_name, stored.reg_number, stored.id);
    Ok(())
}

pub async fn claim(app: &App, scan_id: &str) -> Result<()> {
    let session = app.enter(&Route::ScanDetail(scan_id.to_string()))?;
    let mut store = app.store(&session)?;
    let scan = store.open(scan_id).await?.clone();
    if scan.owner_id != session.user_id && !scan.owner_id.is_empty() {
        bail!("scan {scan_id} belongs to another account");
    }
    let claim = app
        .garage(&session)?
        .file_claim(&scan, store.damages())
        .await?;
    println!(
        "Filed claim {} for ₹{} ({}, {} line item(s))",
        claim.id,
        format_cost(claim.total_cost),
        claim.damage_grade,
        claim.breakdown.len()
    );
    Ok(())
}
