use crate::config::ServiceConfig;
use crate::error::PredictError;
use crate::io_struct::{HealthResponse, PredictReqInput, PredictionResult, UploadQuery};
use crate::media::ImageSource;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, HttpServer, get, http::header, post, web};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::io::Write;

#[get("/health")]
pub async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model: app_state.model_name.clone(),
    })
}

#[post("/api/model")]
pub async fn predict_url(
    req: web::Json<PredictReqInput>,
    app_state: web::Data<AppState>,
) -> Result<web::Json<PredictionResult>, PredictError> {
    let image_url = req.image_url().ok_or(PredictError::MissingImageUrl)?;
    log::info!("Predicting from URL {}", image_url);
    let source = ImageSource::Url(image_url.to_string());
    respond(&app_state, source).await
}

#[post("/predict")]
pub async fn predict_upload(
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    payload: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<web::Json<PredictionResult>, PredictError> {
    let limit = app_state.fetcher.max_image_bytes();
    let (part_filename, body) = if is_multipart(&req) {
        read_file_part(Multipart::new(req.headers(), payload), limit).await?
    } else {
        (None, read_capped(payload, limit).await?)
    };
    if body.is_empty() {
        return Err(PredictError::Validation("image body missing".to_string()));
    }

    let filename = part_filename
        .or(query.into_inner().filename)
        .unwrap_or_else(|| "upload".to_string());
    log::info!("Predicting from upload {} ({} bytes)", filename, body.len());
    let source = ImageSource::Upload {
        filename,
        bytes: body.freeze(),
    };
    respond(&app_state, source).await
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// Returns the `file` part and the filename from its Content-Disposition.
async fn read_file_part(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(Option<String>, BytesMut), PredictError> {
    while let Some(field) = multipart.next().await {
        let field = field.map_err(|e| PredictError::Validation(e.to_string()))?;
        let is_file = field.name() == Some("file");
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        // Other parts are drained so the stream can advance.
        let bytes = read_capped(field, limit).await?;
        if is_file {
            return Ok((filename, bytes));
        }
    }
    Err(PredictError::Validation("file missing".to_string()))
}

async fn read_capped<S, E>(stream: S, limit: usize) -> Result<BytesMut, PredictError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PredictError::Validation(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(PredictError::PayloadTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

async fn respond(
    app_state: &AppState,
    source: ImageSource,
) -> Result<web::Json<PredictionResult>, PredictError> {
    match app_state.predict(source).await {
        Ok(result) => {
            log::info!(
                "Predicted {} ({:.2}%)",
                result.disease_name,
                result.confidence
            );
            Ok(web::Json(result))
        }
        Err(e) => {
            log::error!("Prediction failed: {}", e);
            Err(e)
        }
    }
}

/// Malformed or absent JSON is reported the same way as a missing field.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .content_type_required(false)
        .error_handler(|err, _req| {
            log::debug!("Rejected predict body: {}", err);
            PredictError::MissingImageUrl.into()
        })
}

/// Registers every route on an app. Shared by `startup` and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health)
        .service(predict_url)
        .service(predict_upload);
}

pub fn init_logging(level: log::LevelFilter) {
    // default level is info
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();
}

pub async fn startup(config: ServiceConfig, app_state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(app_state);

    log::info!("Starting server at {}:{}", config.host, config.port);

    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind((config.host, config.port))?
    .run()
    .await?;

    std::io::Result::Ok(())
}
