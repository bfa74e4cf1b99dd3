use std::io::Cursor;
use std::sync::Arc;

use graphene::{FrameRef, RenderAdapter, RenderError, TripleSet, layout};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone)]
pub struct FramePacket {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// JPEG-encoded frame.
    pub data: Arc<[u8]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaRelation {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    /// `[xmin, ymin, xmax, ymax]`
    pub subject_box: [f64; 4],
    pub object_box: [f64; 4],
    /// Where the predicate label goes.
    pub predicate_anchor: [f64; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub relations: Vec<MetaRelation>,
}

impl SceneMeta {
    pub fn from_scene(scene: &TripleSet, sequence: u64, width: u32, height: u32) -> Self {
        let relations = layout(scene)
            .into_iter()
            .map(|item| MetaRelation {
                subject: item.key.subject,
                predicate: item.key.predicate,
                object: item.key.object,
                subject_box: [
                    item.subject_box.xmin,
                    item.subject_box.ymin,
                    item.subject_box.xmax,
                    item.subject_box.ymax,
                ],
                object_box: [
                    item.object_box.xmin,
                    item.object_box.ymin,
                    item.object_box.xmax,
                    item.object_box.ymax,
                ],
                predicate_anchor: [item.predicate_anchor.0, item.predicate_anchor.1],
            })
            .collect();
        Self {
            sequence,
            width,
            height,
            relations,
        }
    }
}

/// Latest frame for polling clients plus a stream of scene updates.
#[derive(Clone)]
pub struct FrameBus {
    pub frame_tx: watch::Sender<Option<FramePacket>>,
    pub meta_tx: broadcast::Sender<SceneMeta>,
}

impl FrameBus {
    pub fn new(capacity: usize) -> Self {
        let (frame_tx, _) = watch::channel::<Option<FramePacket>>(None);
        let (meta_tx, _) = broadcast::channel::<SceneMeta>(capacity.max(1));
        Self { frame_tx, meta_tx }
    }
}

/// Render adapter that publishes every accepted scene onto a `FrameBus`.
pub struct BusRenderer {
    bus: FrameBus,
    jpeg_quality: u8,
}

impl BusRenderer {
    pub fn new(bus: FrameBus) -> Self {
        Self {
            bus,
            jpeg_quality: 80,
        }
    }

    pub fn with_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality.clamp(1, 100);
        self
    }
}

impl RenderAdapter for BusRenderer {
    async fn render(&mut self, scene: &TripleSet, frame: &FrameRef) -> Result<(), RenderError> {
        let path = frame.path.clone();
        let quality = self.jpeg_quality;
        let (width, height, jpeg) = tokio::task::spawn_blocking(move || {
            let image = image::open(&path)?.to_rgb8();
            let mut encoded = Cursor::new(Vec::new());
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, quality)
                .encode_image(&image)?;
            Ok::<_, image::ImageError>((image.width(), image.height(), encoded.into_inner()))
        })
        .await
        .map_err(|e| RenderError::Backend(e.to_string()))??;

        // No subscribers is fine: nobody is watching right now.
        let _ = self.bus.frame_tx.send_replace(Some(FramePacket {
            sequence: frame.sequence,
            width,
            height,
            data: jpeg.into(),
        }));
        let _ = self
            .bus
            .meta_tx
            .send(SceneMeta::from_scene(scene, frame.sequence, width, height));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl ServerConfig {
    /// Reads `GRAPHENE_BIND`, falling back to `127.0.0.1:3001`.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("GRAPHENE_BIND").unwrap_or_else(|_| "127.0.0.1:3001".to_string()),
        }
    }
}

#[cfg(feature = "web")]
pub async fn start_server(bus: FrameBus, cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
    use axum::http::{StatusCode, header};
    use axum::response::{Html, IntoResponse};
    use axum::{Router, routing::get};

    // Viewer page: polls the latest frame and draws the scene boxes on top.
    const INDEX_HTML: &str = r#"<!doctype html>
<html><head><title>Graphene</title></head>
<body style="background:#111;color:#ccc;font-family:monospace">
<h2>Graphene scene viewer</h2>
<div id="status">connecting</div>
<canvas id="view" width="1280" height="720" style="border:1px solid #444"></canvas>
<script>
(function(){
  const status = (t)=>{ document.getElementById('status').textContent = t; };
  const canvas = document.getElementById('view');
  const ctx = canvas.getContext('2d');
  const draw = (meta, img)=>{
    canvas.width = meta.width || img.width; canvas.height = meta.height || img.height;
    ctx.drawImage(img, 0, 0);
    ctx.lineWidth = 2.5; ctx.font = '14px monospace';
    for (const r of meta.relations) {
      const [sx0, sy0, sx1, sy1] = r.subject_box, [ox0, oy0, ox1, oy1] = r.object_box;
      ctx.strokeStyle = 'blue'; ctx.strokeRect(sx0, sy0, sx1 - sx0, sy1 - sy0);
      ctx.strokeStyle = 'orange'; ctx.strokeRect(ox0, oy0, ox1 - ox0, oy1 - oy0);
      ctx.fillStyle = 'white';
      ctx.fillText(r.subject, sx0, sy0); ctx.fillText(r.object, ox0, oy0);
      ctx.fillText(r.predicate, r.predicate_anchor[0], r.predicate_anchor[1]);
    }
    status('frame ' + meta.sequence + ', ' + meta.relations.length + ' relations');
  };
  const ws = new WebSocket((location.protocol==='https:'?'wss://':'ws://')+location.host+'/ws');
  ws.onclose = ()=> status('disconnected');
  ws.onmessage = (ev)=>{
    const meta = JSON.parse(ev.data);
    const img = new Image();
    img.onload = ()=> draw(meta, img);
    img.src = '/frame.jpg?seq=' + meta.sequence;
  };
})();
</script>
</body></html>"#;

    async fn stream_meta(mut socket: WebSocket, bus: FrameBus) {
        let mut rx = bus.meta_tx.subscribe();
        loop {
            match rx.recv().await {
                Ok(meta) => {
                    let Ok(text) = serde_json::to_string(&meta) else { continue };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    let frame_rx = bus.frame_tx.subscribe();
    let bus_ws = bus.clone();
    let app = Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/frame.jpg",
            get(move || {
                let frame_rx = frame_rx.clone();
                async move {
                    let latest = frame_rx.borrow().clone();
                    match latest {
                        Some(packet) => {
                            ([(header::CONTENT_TYPE, "image/jpeg")], packet.data.to_vec()).into_response()
                        }
                        None => StatusCode::NO_CONTENT.into_response(),
                    }
                }
            }),
        )
        .route(
            "/ws",
            get(move |ws: WebSocketUpgrade| {
                let bus = bus_ws.clone();
                async move { ws.on_upgrade(move |socket| stream_meta(socket, bus)) }
            }),
        );

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "visualizer listening");
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "visualizer server stopped");
        }
    });

    Ok(server)
}

#[cfg(not(feature = "web"))]
pub async fn start_server(_bus: FrameBus, _cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    Err(anyhow::anyhow!("web feature not enabled for graphene_visualizer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphene::core_modules::frame_io::save_png;
    use graphene::{BoundingBox, Triple, TripleKey};
    use image::{Rgba, RgbaImage};

    fn scene() -> TripleSet {
        vec![Triple::new(
            TripleKey::new("person", "near", "chair"),
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(20.0, 20.0, 30.0, 30.0),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn meta_carries_layout() {
        let meta = SceneMeta::from_scene(&scene(), 7, 64, 48);
        assert_eq!(meta.sequence, 7);
        assert_eq!(meta.relations.len(), 1);
        let relation = &meta.relations[0];
        assert_eq!(relation.subject, "person");
        assert_eq!(relation.object_box, [20.0, 20.0, 30.0, 30.0]);
        assert_eq!(relation.predicate_anchor, [15.0, 15.0]);
    }

    #[tokio::test]
    async fn renderer_publishes_frame_and_meta() {
        let path = std::env::temp_dir().join(format!("graphene_bus_{}.png", std::process::id()));
        save_png(&path, &RgbaImage::from_pixel(64, 48, Rgba([0, 128, 255, 255]))).unwrap();

        let bus = FrameBus::new(4);
        let mut meta_rx = bus.meta_tx.subscribe();
        let frame_rx = bus.frame_tx.subscribe();
        let mut renderer = BusRenderer::new(bus);

        renderer.render(&scene(), &FrameRef::new(3, &path)).await.unwrap();
        std::fs::remove_file(&path).ok();

        let meta = meta_rx.recv().await.unwrap();
        assert_eq!((meta.sequence, meta.width, meta.height), (3, 64, 48));
        assert_eq!(meta.relations.len(), 1);

        let packet = frame_rx.borrow().clone().unwrap();
        assert_eq!(packet.sequence, 3);
        assert_eq!(&packet.data[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn missing_frame_is_a_render_error() {
        let mut renderer = BusRenderer::new(FrameBus::new(1));
        let frame = FrameRef::new(0, "/nonexistent/graphene/frame.png");
        assert!(renderer.render(&scene(), &frame).await.is_err());
    }
}
