use actix_web::{delete, get, post, put, web};

use crate::{
    api::{error, success},
    modules::setting::{
        model::{BroadcastReloadResponse, UpdateSettingRequest},
        repository_pg::SettingRepositoryPg,
        schema::{Setting, SettingValue},
        service::SettingsService,
    },
    utils::ValidatedJson,
};

pub type SettingSvc = SettingsService<SettingRepositoryPg>;

#[get("")]
pub async fn get_settings(
    setting_svc: web::Data<SettingSvc>,
) -> Result<success::Success<Vec<Setting>>, error::Error> {
    let settings = setting_svc.all().await?;
    Ok(success::Success::ok(Some(settings)).message("Successfully retrieved settings"))
}

#[put("/{key}")]
pub async fn update_setting(
    setting_svc: web::Data<SettingSvc>,
    key: web::Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateSettingRequest>,
) -> Result<success::Success<Setting>, error::Error> {
    let value = SettingValue::from_json(body.value_type, body.value)?;
    let setting = setting_svc.set(&key, value).await?;
    Ok(success::Success::ok(Some(setting)).message("Setting updated"))
}

#[delete("/{key}")]
pub async fn delete_setting(
    setting_svc: web::Data<SettingSvc>,
    key: web::Path<String>,
) -> Result<success::Success<()>, error::Error> {
    setting_svc.delete(&key).await?;
    Ok(success::Success::no_content())
}

#[post("/broadcast/reload")]
pub async fn reload_broadcast(
    setting_svc: web::Data<SettingSvc>,
) -> Result<success::Success<BroadcastReloadResponse>, error::Error> {
    let reloaded = setting_svc.reload_broadcast().await;
    Ok(success::Success::ok(Some(reloaded)).message("Broadcast driver reloaded"))
}
