//! Programmable transaction builder.
//!
//! Collects inputs and commands. Object inputs are recorded by id only and
//! resolved against the ledger (version, digest, sharedness) when the
//! transaction is submitted.

use serde::Serialize;

use super::types::{Argument, Command, ObjectId, ObjectRef, ProgrammableMoveCall, TypeTag};
use crate::types::MomentumError;

/// Input slot awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxInput {
    /// BCS-encoded pure value.
    Pure(Vec<u8>),
    /// Object looked up at submit time. Shared objects become
    /// `SharedObject { mutable }`, owned ones `ImmOrOwnedObject`.
    Object { id: ObjectId, mutable: bool },
    /// Owned object whose reference is already known.
    OwnedRef(ObjectRef),
}

impl TxInput {
    fn object_id(&self) -> Option<&ObjectId> {
        match self {
            TxInput::Object { id, .. } => Some(id),
            TxInput::OwnedRef((id, _, _)) => Some(id),
            TxInput::Pure(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBlock {
    inputs: Vec<TxInput>,
    commands: Vec<Command>,
}

impl TransactionBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_parts(self) -> (Vec<TxInput>, Vec<Command>) {
        (self.inputs, self.commands)
    }

    // -- Inputs -----------------------------------------------------------

    pub fn pure<T: Serialize>(&mut self, value: &T) -> Result<Argument, MomentumError> {
        let bytes = bcs::to_bytes(value)
            .map_err(|e| MomentumError::Build(format!("pure argument: {e}")))?;
        Ok(self.push_input(TxInput::Pure(bytes)))
    }

    /// Object by id. Repeated ids share one input; mutability is OR-ed.
    pub fn object(&mut self, id: ObjectId, mutable: bool) -> Argument {
        if let Some(index) = self.find_object(&id) {
            if let TxInput::Object { mutable: m, .. } = &mut self.inputs[index] {
                *m |= mutable;
            }
            return Argument::Input(index as u16);
        }
        self.push_input(TxInput::Object { id, mutable })
    }

    /// Owned object with a known reference.
    pub fn owned_object(&mut self, obj_ref: ObjectRef) -> Argument {
        if let Some(index) = self.find_object(&obj_ref.0) {
            return Argument::Input(index as u16);
        }
        self.push_input(TxInput::OwnedRef(obj_ref))
    }

    pub fn gas(&self) -> Argument {
        Argument::GasCoin
    }

    fn find_object(&self, id: &ObjectId) -> Option<usize> {
        self.inputs.iter().position(|i| i.object_id() == Some(id))
    }

    fn push_input(&mut self, input: TxInput) -> Argument {
        self.inputs.push(input);
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn push_command(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }

    // -- Commands ---------------------------------------------------------

    /// Split `amounts` off `coin`; one result per amount.
    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Vec<Argument> {
        let count = amounts.len() as u16;
        let result = self.push_command(Command::SplitCoins(coin, amounts));
        (0..count).map(|i| result.nested(i)).collect()
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) {
        self.push_command(Command::MergeCoins(destination, sources));
    }

    pub fn move_call(
        &mut self,
        package: ObjectId,
        module: &str,
        function: &str,
        type_arguments: Vec<TypeTag>,
        arguments: Vec<Argument>,
    ) -> Argument {
        self.push_command(Command::MoveCall(Box::new(ProgrammableMoveCall {
            package,
            module: module.to_string(),
            function: function.to_string(),
            type_arguments,
            arguments,
        })))
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, recipient: Argument) {
        self.push_command(Command::TransferObjects(objects, recipient));
    }
}
