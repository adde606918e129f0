use crate::ir::Module;

use super::Backend;

/// Нативный листинг модуля (см. `Display for Module`)
pub struct TextBackend;

impl Backend for TextBackend {
    fn render(&self, module: &Module) -> String {
        module.to_string()
    }
}
