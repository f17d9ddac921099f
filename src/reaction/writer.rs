use crate::graph_ops::connected_components;
use crate::smarts::to_smarts;
use crate::smiles::{write_smiles, SmilesOutput};

use super::{MolId, QueryReaction, Role, TargetReaction};

/// Writes a query reaction as reaction SMARTS. Multi-fragment templates are
/// wrapped in a component group so they read back as one template.
pub fn to_reaction_smarts(rxn: &QueryReaction) -> String {
    let section = |role: Role| -> String {
        rxn.molecules(role)
            .iter()
            .map(|mol| {
                let smarts = to_smarts(mol);
                if connected_components(mol).len() > 1 {
                    format!("({smarts})")
                } else {
                    smarts
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    };
    join_sections(
        section(Role::Reactant),
        section(Role::Agent),
        section(Role::Product),
    )
}

/// Writes a target reaction with each molecule in input atom order.
pub fn to_reaction_smiles(rxn: &TargetReaction) -> String {
    write_reaction_smiles(rxn, false).0
}

/// Writes a target reaction with each molecule canonicalised. Molecules keep
/// their position within their role.
pub fn to_canonical_reaction_smiles(rxn: &TargetReaction) -> String {
    write_reaction_smiles(rxn, true).0
}

/// Writes a target reaction and returns, for every molecule in
/// reactant/agent/product order, the atom and bond order of its fragment.
pub(crate) fn write_reaction_smiles(
    rxn: &TargetReaction,
    canonical: bool,
) -> (String, Vec<(MolId, SmilesOutput)>) {
    let outputs: Vec<(MolId, SmilesOutput)> = rxn
        .iter()
        .map(|(id, mol)| (id, write_smiles(mol, canonical)))
        .collect();

    let section = |role: Role| -> String {
        outputs
            .iter()
            .filter(|(id, _)| id.role == role)
            .map(|(_, out)| out.smiles.as_str())
            .collect::<Vec<_>>()
            .join(".")
    };
    let text = join_sections(
        section(Role::Reactant),
        section(Role::Agent),
        section(Role::Product),
    );
    (text, outputs)
}

fn join_sections(reactants: String, agents: String, products: String) -> String {
    format!("{reactants}>{agents}>{products}")
}
