//! Wire DTOs shared between the agent runtime (`agentrt-core`) and whatever
//! host process enumerates/executes remote operations on its behalf.
//!
//! This crate has no dependency on `agentrt-core` -- it only describes JSON
//! shapes crossing the process boundary.

pub mod operations;

pub use operations::{
    Binding, BindingMode, EnumerateOperationsResponse, ExecuteOperationRequest,
    ExecuteOperationRequestData, ExecuteOperationResponse, LegacyParam, OperationAction,
    OperationDescriptor,
};
