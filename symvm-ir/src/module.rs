use crate::function::Function;
use crate::types::DataLayout;

/// A global constructor entry: `function` runs before `main`, lower
/// priorities first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ctor {
    pub priority: u16,
    pub function: String,
}

/// A translation unit: functions plus the layout they were compiled for.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub data_layout: DataLayout,
    pub functions: Vec<Function>,
    pub ctors: Vec<Ctor>,
}

impl Module {
    pub fn new(data_layout: DataLayout) -> Self {
        Self {
            data_layout,
            functions: Vec::new(),
            ctors: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn add_function(&mut self, function: Function) -> &mut Function {
        self.functions.push(function);
        self.functions.last_mut().expect("just pushed")
    }

    pub fn add_ctor(&mut self, priority: u16, function: impl Into<String>) {
        self.ctors.push(Ctor {
            priority,
            function: function.into(),
        });
    }
}
