//! A small tour of the accumulator: a full node keeps a [MapPollard] with
//! every leaf remembered so it can prove anything, a wallet keeps one with
//! only its own leaves remembered, and a light verifier gets by with a
//! [Stump]. All three stay in sync by applying the same blocks.

use utreexo::accumulator::map_pollard::Leaf;
use utreexo::accumulator::map_pollard::MapPollard;
use utreexo::accumulator::node_hash::NodeHash;
use utreexo::accumulator::proof::Proof;
use utreexo::accumulator::stump::Stump;

fn main() {
    let mut bridge = MapPollard::new();
    let mut wallet = MapPollard::new();
    let mut verifier = Stump::new();

    // genesis block: eight coins, the wallet owns coin 3
    let coins: Vec<NodeHash> = (0u8..8).map(|i| NodeHash::new([i + 1; 32])).collect();
    let bridge_adds: Vec<Leaf> = coins
        .iter()
        .map(|hash| Leaf {
            hash: *hash,
            remember: true,
        })
        .collect();
    let wallet_adds: Vec<Leaf> = coins
        .iter()
        .enumerate()
        .map(|(i, hash)| Leaf {
            hash: *hash,
            remember: i == 3,
        })
        .collect();

    bridge.modify(&bridge_adds, &[], &Proof::default()).unwrap();
    wallet.modify(&wallet_adds, &[], &Proof::default()).unwrap();
    verifier.modify(&coins, &[], &Proof::default()).unwrap();
    println!("added {} coins, root: {}", verifier.leaves, verifier.roots[0]);

    // a block spends two coins the wallet does not own. Only the bridge
    // can build the proof; everyone can check and apply it.
    let spent = [coins[0], coins[6]];
    let block_proof = bridge.prove(&spent).unwrap();
    assert!(verifier.verify(&block_proof, &spent).unwrap());

    bridge.modify(&[], &spent, &block_proof).unwrap();
    wallet.modify(&[], &spent, &block_proof).unwrap();
    verifier.modify(&[], &spent, &block_proof).unwrap();
    println!("spent 2 coins, root: {}", verifier.roots[0]);

    // the wallet can still prove its own coin against the new roots
    let wallet_proof = wallet.prove(&[coins[3]]).unwrap();
    assert!(verifier.verify(&wallet_proof, &[coins[3]]).unwrap());
    println!(
        "wallet coin still provable at position {}",
        wallet_proof.targets[0]
    );

    // spend it too; afterwards the wallet has nothing left to prove
    wallet.modify(&[], &[coins[3]], &wallet_proof).unwrap();
    verifier.modify(&[], &[coins[3]], &wallet_proof).unwrap();
    assert!(wallet.prove(&[coins[3]]).is_err());
    println!("wallet coin spent, {} roots remain", verifier.roots.len());
}
