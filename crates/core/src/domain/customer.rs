use serde::{Deserialize, Serialize};

/// Customer header of an order. Old records carried a tax id instead of a name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

impl CustomerDetails {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), name: None, tax_id: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Trimmed copy with the tax id uppercased and blank optionals dropped.
    pub fn normalized(&self) -> Self {
        let clean = |value: &Option<String>| {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };
        Self {
            code: self.code.trim().to_string(),
            name: clean(&self.name),
            tax_id: clean(&self.tax_id).map(|value| value.to_uppercase()),
        }
    }

    /// Name used for external systems: the customer name, or the code when absent.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|name| !name.trim().is_empty()).unwrap_or(&self.code)
    }

    /// Identifier line as shown on order detail views.
    pub fn id_line(&self) -> String {
        if self.name.is_some() {
            return self.code.clone();
        }
        match self.tax_id.as_deref() {
            Some(tax_id) => format!("{} / {tax_id}", self.code),
            None => self.code.clone(),
        }
    }
}
