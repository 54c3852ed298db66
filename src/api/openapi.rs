//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

/// OpenAPI 3 document covering the archive, task, admin, and system surfaces
#[derive(OpenApi)]
#[openapi(
    info(
        title = "pagevault REST API",
        description = "On-demand web page archival: submit URLs, poll tasks, retrieve artifacts",
        license(name = "MIT OR Apache-2.0")
    ),
    paths(
        crate::api::routes::archive::archive_with,
        crate::api::routes::archive::save_default,
        crate::api::routes::archive::archive_with_batch,
        crate::api::routes::archive::save_default_batch,
        crate::api::routes::archive::retrieve_archive,
        crate::api::routes::archive::archive_size,
        crate::api::routes::tasks::get_task_status,
        crate::api::routes::admin::list_saves,
        crate::api::routes::admin::list_archivers,
        crate::api::routes::admin::delete_save,
        crate::api::routes::admin::delete_saves_by_item,
        crate::api::routes::admin::delete_saves_by_url,
        crate::api::routes::admin::requeue_save,
        crate::api::routes::admin::summarize_article,
        crate::api::routes::system::health_check,
        crate::api::routes::system::healthz_check,
        crate::api::routes::system::openapi_spec,
        crate::api::routes::system::event_stream,
    ),
    components(schemas(
        crate::types::SaveRequest,
        crate::types::SaveResponse,
        crate::types::BatchSaveItem,
        crate::types::BatchCreateRequest,
        crate::types::TaskAccepted,
        crate::types::TaskItemStatus,
        crate::types::TaskStatusResponse,
        crate::types::ArchiveRetrieveRequest,
        crate::types::ArtifactSize,
        crate::types::SizeStatsResponse,
        crate::types::AdminSaveRow,
        crate::types::DeleteResponse,
        crate::types::SummarizeRequest,
        crate::types::SummarizeResponse,
        crate::types::ArchiveStatus,
        crate::types::StorageUploadRecord,
        crate::types::PageMetadata,
        crate::types::ArchiveResult,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "archive", description = "Submit URLs and retrieve artifacts"),
        (name = "tasks", description = "Poll asynchronous task status"),
        (name = "admin", description = "Catalog administration"),
        (name = "system", description = "Health and introspection")
    )
)]
pub struct ApiDoc;
