use crate::config::ViewerConfig;
use crate::render::SnapshotRenderer;
use common::wait_for_resource_async;
use protocol::session::{self, Session};
use protocol::streams::protocols;
use protocol::ws::{self, WsReader, WsWriter};
use protocol::{Channel, ControlState, Event, Resolution};
use std::path::PathBuf;
use tokio::sync::mpsc;

const EVENT_QUEUE_DEPTH: usize = 64;

type ViewerSession = Session<SnapshotRenderer>;

struct Link {
    channel: Channel<ViewerSession>,
    writer: Option<WsWriter>,
}

/// Stands in for a user at the controls: picks the configured camera and
/// model once they are offered and presses play.
#[derive(Debug, Default)]
pub struct Autoplay {
    pub camera_device: Option<String>,
    pub camera_resolution: Option<Resolution>,
    pub model: Option<String>,
    camera_done: bool,
    model_done: bool,
}

impl Autoplay {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            camera_device: config.camera_device.clone(),
            camera_resolution: config.resolution(),
            model: config.model.clone(),
            ..Self::default()
        }
    }

    /// Start the camera on `camera` and the model on `drpai`, each at most
    /// once.
    pub fn apply(
        &mut self,
        session: &mut ViewerSession,
        camera: Option<&mut Channel<ViewerSession>>,
        drpai: Option<&mut Channel<ViewerSession>>,
    ) {
        if !self.camera_done
            && let (Some(id), Some(channel)) = (self.camera_device.as_deref(), camera)
            && session.cameras.selection_enabled()
            && session.cameras.state() == ControlState::NoSelection
            && session.cameras.items().iter().any(|d| d.id == id)
        {
            self.camera_done = true;
            let result = session.cameras.select(id).and_then(|_| {
                if let Some(res) = self.camera_resolution {
                    session.cameras.select_resolution(res)?;
                }
                session.cameras.toggle(channel.outbox_mut())
            });
            match result {
                Ok(state) => tracing::info!(device = id, state = ?state, "Camera started"),
                Err(e) => tracing::warn!(device = id, error = %e, "Could not start camera"),
            }
        }

        if !self.model_done
            && let (Some(name), Some(channel)) = (self.model.as_deref(), drpai)
            && session.models.selection_enabled()
            && session.models.state() == ControlState::NoSelection
            && session.models.items().iter().any(|m| m.name == name)
        {
            self.model_done = true;
            let result = session
                .models
                .select(name)
                .and_then(|_| session.models.toggle(channel.outbox_mut()));
            match result {
                Ok(state) => tracing::info!(model = name, state = ?state, "Model started"),
                Err(e) => tracing::warn!(model = name, error = %e, "Could not start model"),
            }
        }
    }
}

/// Connect every configured channel and process their events one at a
/// time until all of them are closed or the process is interrupted.
pub async fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let renderer = SnapshotRenderer::new(
        config.snapshot_path.as_ref().map(PathBuf::from),
        config.snapshot_every,
    );
    let mut session = Session::new(renderer).with_frames_per_tick(config.frames_per_tick);
    let mut autoplay = Autoplay::from_config(&config);

    let url = ws::channel_url(&config.server_url, "");
    let (tx, mut rx) = mpsc::channel::<(usize, Event)>(EVENT_QUEUE_DEPTH);
    let mut links: Vec<Link> = Vec::new();

    for name in config.channel_names() {
        let Some(channel) = session::channel_for(name) else {
            tracing::warn!(protocol = name, "Unknown channel - skipping");
            continue;
        };

        let Some((writer, reader)) =
            connect_or_cancel(&url, name, config.connect_poll_ms, tokio::signal::ctrl_c()).await
        else {
            tracing::info!(protocol = name, "Interrupted while connecting - shutting down");
            return Ok(());
        };

        tokio::spawn(forward_events(links.len(), reader, tx.clone()));
        links.push(Link {
            channel,
            writer: Some(writer),
        });
    }
    drop(tx);

    if links.is_empty() {
        anyhow::bail!("No usable channels configured ({})", config.channels);
    }

    tracing::info!(url = %url, channels = links.len(), "Viewer connected");

    let mut open = links.len();

    loop {
        let (index, event) = tokio::select! {
            received = rx.recv() => match received {
                Some(received) => received,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted - shutting down");
                break;
            }
        };

        let closing = matches!(event, Event::Close { .. });
        let link = &mut links[index];

        if let Err(e) = link.channel.handle(event, &mut session) {
            tracing::warn!(
                protocol = link.channel.protocol(),
                error = %e,
                "Dropping inbound frame"
            );
        }

        if closing {
            link.writer = None;
            open -= 1;
        }

        let (camera, drpai) = camera_and_drpai(&mut links);
        autoplay.apply(&mut session, camera, drpai);

        flush(&mut links).await;

        if open == 0 {
            tracing::info!("All channels closed");
            break;
        }
    }

    for link in links.iter_mut() {
        if let Some(writer) = link.writer.as_mut()
            && let Err(e) = writer.close().await
        {
            tracing::debug!(protocol = link.channel.protocol(), error = %e, "Close failed");
        }
    }

    Ok(())
}

/// Keep trying to connect `protocol` until it succeeds or `cancel`
/// completes first.
async fn connect_or_cancel<C: Future>(
    url: &str,
    protocol: &str,
    poll_interval_ms: u64,
    cancel: C,
) -> Option<(WsWriter, WsReader)> {
    let label = format!("{protocol} channel");
    tokio::select! {
        biased;
        _ = cancel => None,
        connected = wait_for_resource_async(
            || ws::connect(url, protocol),
            poll_interval_ms,
            &label,
        ) => Some(connected),
    }
}

fn camera_and_drpai(
    links: &mut [Link],
) -> (
    Option<&mut Channel<ViewerSession>>,
    Option<&mut Channel<ViewerSession>>,
) {
    let mut camera = None;
    let mut drpai = None;
    for link in links.iter_mut() {
        match link.channel.protocol() {
            protocols::CAMERA => camera = Some(&mut link.channel),
            protocols::DRPAI => drpai = Some(&mut link.channel),
            _ => {}
        }
    }
    (camera, drpai)
}

async fn flush(links: &mut [Link]) {
    for link in links.iter_mut() {
        let outgoing = match link.channel.take_outgoing() {
            Ok(outgoing) => outgoing,
            Err(e) => {
                tracing::error!(protocol = link.channel.protocol(), error = %e, "Encoding failed");
                continue;
            }
        };

        let Some(writer) = link.writer.as_mut() else {
            continue;
        };

        for text in outgoing {
            if let Err(e) = writer.send_text(&text).await {
                tracing::error!(protocol = link.channel.protocol(), error = %e, "Send failed");
                break;
            }
        }
    }
}

/// Pump one socket into the shared event queue: `Open` first, then every
/// message, then exactly one `Close`.
async fn forward_events(index: usize, mut reader: WsReader, tx: mpsc::Sender<(usize, Event)>) {
    if tx.send((index, Event::Open)).await.is_err() {
        return;
    }

    let close = loop {
        match reader.recv().await {
            Some(Ok(event @ Event::Close { .. })) => break event,
            Some(Ok(event)) => {
                if tx.send((index, event)).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(channel = index, error = %e, "Channel read failed");
                break Event::Close {
                    reason: Some(e.to_string()),
                };
            }
            None => break Event::Close { reason: None },
        }
    };

    let _ = tx.send((index, close)).await;
}
