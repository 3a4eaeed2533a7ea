use std::sync::Arc;

use stack_core::{ComponentKind, ComponentRecord, StackComponent, StackError, StackValidator};

/// Componente sin comportamiento: sólo aporta su registro al stack. Sirve
/// para los kinds opcionales cuyo backend vive fuera del core.
#[derive(Debug)]
pub struct RecordOnlyComponent {
    record: ComponentRecord,
}

impl RecordOnlyComponent {
    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        if record.kind.is_mandatory() {
            return Err(StackError::StackValidation { component: record.name.clone(),
                                                     reason: format!("flavor '{}' cannot act as {}", record.flavor, record.kind) });
        }
        Ok(Arc::new(Self { record }))
    }
}

impl StackComponent for RecordOnlyComponent {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }
}

/// Step operator que corre steps en contenedores; necesita un container
/// registry en el mismo stack y, si se configura `registry_flavor`, que sea de
/// ese flavor.
#[derive(Debug)]
pub struct ContainerStepOperator {
    record: ComponentRecord,
}

impl ContainerStepOperator {
    pub fn factory(record: ComponentRecord) -> Result<Arc<dyn StackComponent>, StackError> {
        Ok(Arc::new(Self { record }))
    }

    pub fn image(&self) -> &str {
        self.record.config_str("image").unwrap_or("stackflow/step:latest")
    }
}

impl StackComponent for ContainerStepOperator {
    fn record(&self) -> &ComponentRecord {
        &self.record
    }

    fn validator(&self) -> Option<StackValidator> {
        let wanted = self.record.config_str("registry_flavor").map(str::to_string);
        let validator = StackValidator::requires([ComponentKind::ContainerRegistry]);
        Some(match wanted {
                 None => validator,
                 Some(flavor) => validator.with_custom(move |stack| {
                                              let actual = stack.component(ComponentKind::ContainerRegistry)
                                                                .map(|c| c.record().flavor.clone())
                                                                .unwrap_or_default();
                                              if actual == flavor {
                                                  Ok(())
                                              } else {
                                                  Err(format!("container registry must be of flavor '{flavor}', found '{actual}'"))
                                              }
                                          }),
             })
    }
}
