#[tokio::main]
async fn main() {
    jam_stf_node::node_main().await;
}
