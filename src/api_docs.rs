use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::books::create_book,
        api::books::get_book,
        api::circulation::issue_book,
        api::circulation::return_book,
        api::circulation::pay_fine,
        api::fees::student_fee_summary,
        api::fees::collect_payment,
        api::fees::bulk_collect,
        api::fees::get_receipt,
        api::dashboard::admin_dashboard,
    ),
    tags(
        (name = "campus-library", description = "Campus library circulation and fee ledger API")
    )
)]
pub struct ApiDoc;
