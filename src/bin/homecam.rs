//! homecam - home camera content producer
//!
//! This daemon:
//! 1. Captures one snapshot per cycle from the configured source
//! 2. Publishes it as a new version of `/yoursunny.com/homecam-<camera>`
//! 3. Keeps the route to that prefix registered on the forwarder
//! 4. Answers interests for published segments between captures
//!
//! It runs until the first failure and then exits non-zero; restarts are
//! left to the process supervisor.

use anyhow::{anyhow, Result};
use clap::Parser;

use homecam::face::TcpFace;
use homecam::registration::StaticRegistrationClient;
use homecam::{
    source_from_uri, ContentProducer, FrameSource, HttpRegistrationClient, LoopbackFace,
    NameBuilder, NetworkFace, ProducerConfig, RegistrationClient, RegistrationScheduler,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Publish home camera snapshots as named data")]
struct Args {
    /// Camera identifier; the published prefix is /yoursunny.com/homecam-<camera>.
    #[arg(long, env = "HOMECAM_CAMERA")]
    camera: Option<String>,

    /// Forwarder host (default: hobo.cs.arizona.edu).
    /// `stub://...` runs against an in-process loopback face.
    #[arg(long, env = "HOMECAM_ROUTER")]
    router: Option<String>,

    /// Forwarder TCP port (default: 6363).
    #[arg(long, env = "HOMECAM_ROUTER_PORT")]
    router_port: Option<u16>,

    /// Frame source: stub://..., http(s)://... snapshot URL, or a file path.
    #[arg(long, env = "HOMECAM_SOURCE")]
    source: Option<String>,

    /// Segment payload size in bytes (default: 1200).
    #[arg(long, env = "HOMECAM_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Freshness period of published segments in milliseconds (default: 10000).
    #[arg(long, env = "HOMECAM_FRESHNESS_MS")]
    freshness_ms: Option<u64>,

    /// Minimum seconds between route registrations (default: 180).
    #[arg(long, env = "HOMECAM_REGISTRATION_INTERVAL_SECS")]
    registration_interval_secs: Option<u64>,

    /// Face event iterations per cycle (default: 1000).
    #[arg(long, env = "HOMECAM_DRAIN_ITERATIONS")]
    drain_iterations: Option<usize>,
}

impl Args {
    fn apply(self, cfg: &mut ProducerConfig) {
        if let Some(camera) = self.camera {
            cfg.camera = Some(camera);
        }
        if let Some(router) = self.router {
            cfg.router = router;
        }
        if let Some(port) = self.router_port {
            cfg.router_port = port;
        }
        if let Some(source) = self.source {
            cfg.source = source;
        }
        if let Some(chunk_size) = self.chunk_size {
            cfg.chunk_size = chunk_size;
        }
        if let Some(ms) = self.freshness_ms {
            cfg.freshness_period = std::time::Duration::from_millis(ms);
        }
        if let Some(secs) = self.registration_interval_secs {
            cfg.registration_interval = std::time::Duration::from_secs(secs);
        }
        if let Some(iterations) = self.drain_iterations {
            cfg.drain_iterations = iterations;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ProducerConfig::load()?;
    args.apply(&mut cfg);
    let camera = cfg.validate()?;
    let prefix = NameBuilder::base_prefix(&camera);

    log::info!(
        "homecam {} starting: camera={} router={}:{} source={}",
        env!("CARGO_PKG_VERSION"),
        camera,
        cfg.router,
        cfg.router_port,
        cfg.source
    );

    let source: Box<dyn FrameSource + Send> = source_from_uri(&cfg.source)?;
    let (face, client): (
        Box<dyn NetworkFace + Send>,
        Box<dyn RegistrationClient + Send>,
    ) = if cfg.uses_loopback_router() {
        log::warn!("router {} is a loopback stub; nothing leaves this process", cfg.router);
        (
            Box::new(LoopbackFace::new()),
            Box::new(StaticRegistrationClient::local_rib_register(&prefix)),
        )
    } else {
        (
            Box::new(TcpFace::connect(&cfg.router, cfg.router_port)?),
            Box::new(HttpRegistrationClient::new(&cfg.registration_url)?),
        )
    };
    let scheduler = RegistrationScheduler::new(camera.clone(), client, cfg.registration_interval);

    let mut producer = ContentProducer::new(
        &camera,
        source,
        face,
        scheduler,
        cfg.producer_settings(),
    )?;

    let err = match producer.run() {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    let stats = producer.stats();
    log::error!(
        "{} failure after {} cycles ({} segments, last version {:?}): {}",
        err.kind(),
        stats.cycles,
        stats.segments_published,
        stats.last_version,
        err
    );
    Err(anyhow!(err))
}
