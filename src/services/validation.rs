use crate::errors::ToolError;
use serde_json::Value;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    pub fn ensure_title(&self, value: Option<&Value>) -> Result<String, ToolError> {
        let value = value.ok_or_else(|| ToolError::invalid_params("title is required"))?;
        let title = self.ensure_string(value, "title", true)?;
        if title.contains('\0') {
            return Err(ToolError::invalid_params("title must not contain null bytes"));
        }
        Ok(title)
    }

    pub fn ensure_page_limit(
        &self,
        value: Option<&Value>,
        fallback: usize,
    ) -> Result<usize, ToolError> {
        let Some(value) = value else {
            return Ok(fallback);
        };
        if value.is_null() {
            return Ok(fallback);
        }
        let numeric = value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
            .ok_or_else(|| ToolError::invalid_params("max_pages must be a positive integer"))?;
        if numeric == 0 {
            return Err(ToolError::invalid_params("max_pages must be a positive integer"));
        }
        Ok(numeric as usize)
    }

    pub fn ensure_optional_body(&self, value: Option<&Value>) -> Result<Option<Value>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val @ Value::Object(_)) | Some(val @ Value::Array(_)) => Ok(Some(val.clone())),
            Some(Value::String(text)) => serde_json::from_str(text)
                .map(Some)
                .map_err(|err| ToolError::invalid_params(format!("body is not valid JSON: {}", err))),
            Some(_) => Err(ToolError::invalid_params(
                "body must be a JSON object, array or JSON string",
            )),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
