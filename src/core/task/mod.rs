//! Task data model: steps, results, answer types, task definitions, and the
//! decode factory that turns declarative JSON into runnable tasks.

pub mod answer;
pub mod definition;
pub mod factory;
pub mod objects;
pub mod result;
pub mod step;

pub use answer::{AnswerType, BaseType, SequenceType};
pub use definition::{AsyncActionConfiguration, SchemaInfo, Task, TaskInfo, TaskTransformer};
pub use factory::TaskFactory;
pub use result::{
    AnswerResult, BaseResult, CollectionResult, ErrorResult, FileResult, ResultObject, TaskResult,
};
pub use step::Step;
