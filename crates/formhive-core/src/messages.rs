use serde::{Deserialize, Serialize};

fn default_summary_header() -> String {
    "Ваши данные:".to_string()
}

fn default_confirm_prompt() -> String {
    "Подтвердите, если данные верны. Введите \"Да\" или \"Нет\".".to_string()
}

fn default_yes() -> String {
    "да".to_string()
}

fn default_no() -> String {
    "нет".to_string()
}

fn default_photo_placeholder() -> String {
    "добавлено...".to_string()
}

fn default_submitted() -> String {
    "Данные успешно отправлены!\n\nДля повторной отправки данных нажмите: /start".to_string()
}

fn default_submit_failed() -> String {
    "Произошла ошибка при отправке данных. Попробуйте снова.".to_string()
}

fn default_photo_failed() -> String {
    "Не удалось получить ваше фото. Пожалуйста, попробуйте снова.".to_string()
}

/// User-facing texts, Russian by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default = "default_summary_header")]
    pub summary_header: String,
    #[serde(default = "default_confirm_prompt")]
    pub confirm_prompt: String,
    #[serde(default = "default_yes")]
    pub yes: String,
    #[serde(default = "default_no")]
    pub no: String,
    #[serde(default = "default_photo_placeholder")]
    pub photo_placeholder: String,
    #[serde(default = "default_submitted")]
    pub submitted: String,
    #[serde(default = "default_submit_failed")]
    pub submit_failed: String,
    #[serde(default = "default_photo_failed")]
    pub photo_failed: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            summary_header: default_summary_header(),
            confirm_prompt: default_confirm_prompt(),
            yes: default_yes(),
            no: default_no(),
            photo_placeholder: default_photo_placeholder(),
            submitted: default_submitted(),
            submit_failed: default_submit_failed(),
            photo_failed: default_photo_failed(),
        }
    }
}

impl Messages {
    pub fn is_yes(&self, input: &str) -> bool {
        token_matches(input, &self.yes)
    }

    pub fn is_no(&self, input: &str) -> bool {
        token_matches(input, &self.no)
    }
}

fn token_matches(input: &str, token: &str) -> bool {
    input.trim().to_lowercase() == token.trim().to_lowercase()
}
