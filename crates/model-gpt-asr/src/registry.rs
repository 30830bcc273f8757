//! Фабрика модели для внешнего реестра/тренировочного харнесса.

use candle_nn::VarBuilder;
use serde_json::Value;

use asr_core::AsrResult;

use crate::config::GptAsrConfig;
use crate::model::GptAsr;

/// Разобрать конфигурацию из мэппинга опций реестра.
///
/// Гиперпараметры берутся из под-мэппинга `kwargs`; отсутствующие поля
/// заполняются значениями по умолчанию, отсутствие `kwargs` целиком —
/// полный дефолт.
pub fn config_from_options(options: &Value) -> AsrResult<GptAsrConfig> {
    match options.get("kwargs") {
        Some(kwargs) => Ok(serde_json::from_value(kwargs.clone())?),
        None => Ok(GptAsrConfig::default()),
    }
}

/// Построить [`GptAsr`] из мэппинга опций внешнего реестра.
pub fn from_options(options: &Value, vb: VarBuilder) -> AsrResult<GptAsr> {
    let config = config_from_options(options)?;
    GptAsr::new(config, vb)
}
